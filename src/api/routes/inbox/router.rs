//! Router for mailbox inspection

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, extract::State, response::Json};
use axum_extra::extract::Query;

use super::public;
use crate::api::state::AppState;
use crate::google::gmail::{self, GmailClient};
use crate::google::oauth::refresh_access_token;
use crate::signin::search::broad_query;

type SharedState = Arc<RwLock<AppState>>;

/// Shows what the sign-in sender mailed us recently. Handy when a sign-in
/// run fails and the question is whether the mail ever arrived.
async fn inbox_latest_handler(
    State(state): State<SharedState>,
    Query(params): Query<public::InboxLatestQuery>,
) -> Result<Json<Vec<public::InboxMessage>>, crate::api::public::ApiError> {
    let config = {
        let shared_state = state.read().expect("Unable to read shared state");
        shared_state.config.clone()
    };

    let identity = params.device.unwrap_or_default();
    let email = config
        .mailboxes
        .mailbox_for(&identity, params.email.as_deref());
    let creds = config
        .mailboxes
        .credentials(&email)
        .ok_or_else(|| anyhow::anyhow!("no mailbox credentials on file for {}", email))?;
    let oauth =
        refresh_access_token(&creds.client_id, &creds.client_secret, &creds.refresh_token).await?;

    let client = GmailClient::new(
        &oauth.access_token,
        Duration::from_secs(config.http_timeout_secs),
    );
    let limit = params.limit.unwrap_or(5);
    let query = broad_query(&config.signin_sender, config.search_window_days);
    let hits = client.search_messages(&query, limit).await?;

    let mut messages = Vec::new();
    for hit in hits {
        let message = client.get_message(&hit.id).await?;
        messages.push(public::InboxMessage {
            id: message.id.clone(),
            received: message.internal_date.clone().unwrap_or_default(),
            from: gmail::extract_from(&message),
            subject: gmail::extract_subject(&message),
            snippet: message.snippet.clone().unwrap_or_default(),
        });
    }
    messages.sort_by_key(|m| std::cmp::Reverse(m.received.clone()));

    Ok(Json(messages))
}

/// Create the inbox router
pub fn router() -> Router<SharedState> {
    Router::new().route("/latest", axum::routing::get(inbox_latest_handler))
}
