//! Mailbox queries for locating the sign-in message.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::debug;

use super::SignInError;
use crate::google::gmail::{GmailClient, MessageResponse};

/// Cap on hits pulled per query. Sign-in mail is recent by construction, so
/// anything past the first few is stale.
pub const CANDIDATES_PER_QUERY: u32 = 5;

/// Search queries ordered from most to least specific. Earlier queries pin
/// the recipient and unread state; later ones relax those so a shared inbox
/// or an already-opened message still matches.
pub fn candidate_queries(sender: &str, to_email: &str, window_days: i64) -> Vec<String> {
    let after = after_date(window_days);
    vec![
        format!("from:{} to:{} is:unread after:{}", sender, to_email, after),
        format!("from:{} to:{} after:{}", sender, to_email, after),
        broad_query(sender, window_days),
    ]
}

/// The widest net: everything the sender mailed us inside the window,
/// regardless of recipient or read state.
pub fn broad_query(sender: &str, window_days: i64) -> String {
    format!("from:{} after:{}", sender, after_date(window_days))
}

fn after_date(window_days: i64) -> String {
    (Utc::now() - Duration::days(window_days))
        .format("%Y/%m/%d")
        .to_string()
}

/// Run every query and gather the hits into one list, deduplicated by
/// message id, preserving query order so the most specific matches come
/// first.
pub async fn collect_candidates(
    gmail: &GmailClient,
    queries: &[String],
    per_query: u32,
) -> Result<Vec<MessageResponse>, SignInError> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for query in queries {
        debug!(query = %query, "Searching mailbox");
        let hits = gmail
            .search_messages(query, per_query)
            .await
            .map_err(|err| SignInError::MailApi(err.to_string()))?;
        for hit in hits {
            if seen.insert(hit.id.clone()) {
                candidates.push(hit);
            }
        }
    }
    Ok(candidates)
}
