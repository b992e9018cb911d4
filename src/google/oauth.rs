//! OAuth token exchange against Google's token endpoint

use anyhow::{Result, bail};
use reqwest::Client;
use serde::Deserialize;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    /// Only present on the initial authorization code exchange
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Exchange a long-lived refresh token for a fresh access token.
pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken> {
    token_request(
        TOKEN_ENDPOINT,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}

/// Exchange an authorization code for tokens. Run once per mailbox to mint
/// the refresh token stored in the mailbox directory.
pub async fn exchange_code_for_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<OAuthToken> {
    token_request(
        TOKEN_ENDPOINT,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

pub(crate) async fn token_request(endpoint: &str, params: &[(&str, &str)]) -> Result<OAuthToken> {
    let res = Client::new().post(endpoint).form(params).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        // Google puts the useful message in error_description
        let desc = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("error_description")
                    .or_else(|| v.get("error"))
                    .and_then(|d| d.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(text);
        bail!("Token request failed: {} ({})", status, desc);
    }
    let token: OAuthToken = serde_json::from_str(&text)?;
    Ok(token)
}
