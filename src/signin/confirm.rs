//! Replays the confirmation link the way a browser would.

use std::time::Duration;

use reqwest::{Client, Url, header, redirect::Policy};
use tracing::debug;

use super::SignInError;
use super::html;

// Confirmation links bounce through a short redirect chain before landing on
// the page that carries the form.
const MAX_REDIRECTS: usize = 5;

/// Follow the sign-in link and submit the confirmation form it lands on.
///
/// The whole exchange runs on one cookie-holding client so the session that
/// rendered the form is the session that submits it. A final status under
/// 400 counts as success; these pages signal failure with an error status,
/// not with a 200 and an error banner.
pub async fn confirm_sign_in(link: &str, timeout: Duration) -> Result<(), SignInError> {
    let client = Client::builder()
        .cookie_store(true)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()?;

    debug!(link = %link, "Fetching confirmation page");
    let response = client.get(link).send().await?;
    // The redirect chain can move us; the form resolves against where we
    // landed, not where we started.
    let final_url = response.url().clone();
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(SignInError::BadStatus {
            stage: "fetch",
            status: status.as_u16(),
        });
    }
    let page = response.text().await?;

    let csrf_token = html::csrf_meta_token(&page);
    let form = match html::first_form(&page) {
        Some(form) => html::parse_form(form),
        None => return Err(SignInError::FormNotFound),
    };

    submit_form(&client, &final_url, csrf_token.as_deref(), &form).await
}

async fn submit_form(
    client: &Client,
    page_url: &Url,
    csrf_token: Option<&str>,
    form: &html::ConfirmationForm,
) -> Result<(), SignInError> {
    let action_url = match form.action.as_deref() {
        // Action-less forms post back to the page itself
        None | Some("") => page_url.clone(),
        Some(action) => page_url
            .join(action)
            .map_err(|_| SignInError::InvalidLink(action.to_string()))?,
    };

    let mut fields = form.fields.clone();
    if let Some(label) = &form.submit_label {
        fields.push(("commit".to_string(), label.clone()));
    }

    let mut request = client
        .post(action_url.clone())
        .header(header::ORIGIN, page_url.origin().ascii_serialization())
        .header(header::REFERER, page_url.as_str())
        .form(&fields);
    if let Some(token) = csrf_token {
        request = request.header("X-CSRF-Token", token);
    }

    let response = request.send().await?;
    let status = response.status();
    debug!(status = %status, action = %action_url, "Confirmation form submitted");
    if status.as_u16() >= 400 {
        return Err(SignInError::BadStatus {
            stage: "submit",
            status: status.as_u16(),
        });
    }
    Ok(())
}
