use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::AppConfig;
use crate::google::gmail::{self, GmailClient};
use crate::google::oauth::refresh_access_token;
use crate::signin::search::broad_query;

pub async fn run(device: &str, email: Option<&str>, limit: u32) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let email = config.mailboxes.mailbox_for(device, email);
    let creds = config
        .mailboxes
        .credentials(&email)
        .ok_or_else(|| anyhow!("no mailbox credentials on file for {}", email))?;
    let oauth =
        refresh_access_token(&creds.client_id, &creds.client_secret, &creds.refresh_token).await?;
    let client = GmailClient::new(
        &oauth.access_token,
        Duration::from_secs(config.http_timeout_secs),
    );

    let query = broad_query(&config.signin_sender, config.search_window_days);
    let hits = client.search_messages(&query, limit).await?;
    if hits.is_empty() {
        println!(
            "No sign-in mail for {} in the last {} day(s)",
            email, config.search_window_days
        );
        return Ok(());
    }

    for hit in hits {
        let message = client.get_message(&hit.id).await?;
        println!(
            "{}  {}  {}",
            message.id,
            gmail::extract_from(&message),
            gmail::extract_subject(&message)
        );
    }

    Ok(())
}
