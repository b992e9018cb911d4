use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::AppConfig;
use crate::signin::{SignInFlow, retry::TokioDelay};

pub async fn run(device: &str, email: Option<&str>) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let flow = SignInFlow::new(&config, device, email).await?;
    let report = flow.run(&TokioDelay).await?;

    println!(
        "Signed in via {} (message {}, attempt {}{})",
        report.email,
        report.message_id,
        report.attempts,
        if report.marked_read {
            ""
        } else {
            ", mail left unread"
        },
    );

    Ok(())
}
