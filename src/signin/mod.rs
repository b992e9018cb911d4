//! Email-driven sign-in confirmation.
//!
//! Signing in on a test device sends a confirmation mail to the device's
//! mailbox. This module polls that mailbox, pulls the confirmation link out
//! of the message, replays the link like a browser would, and marks the mail
//! read so the next run starts clean.

pub mod confirm;
pub mod extract;
pub mod html;
pub mod retry;
pub mod search;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::AppConfig;
use crate::google::gmail::{self, GmailClient};
use crate::google::oauth;
use retry::{Delay, RetryPolicy};

#[derive(Debug, Error)]
pub enum SignInError {
    #[error("no mailbox credentials on file for {0}")]
    MissingCredentials(String),
    #[error("refreshing mailbox access failed: {0}")]
    TokenRefresh(String),
    #[error("mailbox API call failed: {0}")]
    MailApi(String),
    #[error("no sign-in mail arrived after {attempts} attempts")]
    MessageNotFound { attempts: u32 },
    #[error("message {message_id} contained no sign-in link")]
    LinkNotFound { message_id: String },
    #[error("confirmation page has no form to submit")]
    FormNotFound,
    #[error("form action did not resolve to a URL: {0}")]
    InvalidLink(String),
    #[error("confirmation {stage} returned status {status}")]
    BadStatus { stage: &'static str, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Phase of the pipeline a failure belongs to, for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInStage {
    Setup,
    Search,
    Extract,
    Confirm,
}

impl fmt::Display for SignInStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignInStage::Setup => "setup",
            SignInStage::Search => "search",
            SignInStage::Extract => "extract",
            SignInStage::Confirm => "confirm",
        };
        write!(f, "{}", name)
    }
}

impl SignInError {
    pub fn stage(&self) -> SignInStage {
        match self {
            SignInError::MissingCredentials(_) | SignInError::TokenRefresh(_) => SignInStage::Setup,
            SignInError::MailApi(_) | SignInError::MessageNotFound { .. } => SignInStage::Search,
            SignInError::LinkNotFound { .. } => SignInStage::Extract,
            SignInError::FormNotFound
            | SignInError::InvalidLink(_)
            | SignInError::BadStatus { .. }
            | SignInError::Http(_) => SignInStage::Confirm,
        }
    }
}

/// Outcome of a completed confirmation run.
#[derive(Debug, Clone, Serialize)]
pub struct SignInReport {
    pub email: String,
    pub message_id: String,
    pub link: String,
    pub attempts: u32,
    pub marked_read: bool,
}

/// One confirmation run for one device identity. Builds its own Gmail client
/// and HTTP session; nothing outlives the call.
pub struct SignInFlow {
    email: String,
    queries: Vec<String>,
    policy: RetryPolicy,
    timeout: Duration,
    link_domain_hint: Option<String>,
    gmail: GmailClient,
}

impl SignInFlow {
    /// Resolve the mailbox for the identity and trade its refresh token for
    /// an access token.
    pub async fn new(
        config: &AppConfig,
        identity: &str,
        email_override: Option<&str>,
    ) -> Result<Self, SignInError> {
        let email = config.mailboxes.mailbox_for(identity, email_override);
        let creds = config
            .mailboxes
            .credentials(&email)
            .ok_or_else(|| SignInError::MissingCredentials(email.clone()))?;
        let token =
            oauth::refresh_access_token(&creds.client_id, &creds.client_secret, &creds.refresh_token)
                .await
                .map_err(|err| SignInError::TokenRefresh(err.to_string()))?;

        let timeout = Duration::from_secs(config.http_timeout_secs);
        Ok(Self {
            queries: search::candidate_queries(
                &config.signin_sender,
                &email,
                config.search_window_days,
            ),
            policy: RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.backoff_base_secs),
            ),
            timeout,
            link_domain_hint: config.link_domain_hint.clone(),
            gmail: GmailClient::new(&token.access_token, timeout),
            email,
        })
    }

    /// Build a flow around an existing Gmail client, skipping the token
    /// exchange. Lets tests point the flow at mock servers.
    pub fn with_client(
        gmail: GmailClient,
        email: &str,
        queries: Vec<String>,
        policy: RetryPolicy,
        timeout: Duration,
        link_domain_hint: Option<String>,
    ) -> Self {
        Self {
            email: email.to_string(),
            queries,
            policy,
            timeout,
            link_domain_hint,
            gmail,
        }
    }

    /// Drive the whole confirmation: poll the mailbox, extract the link,
    /// replay it, mark the mail read.
    pub async fn run(&self, delay: &dyn Delay) -> Result<SignInReport, SignInError> {
        info!(email = %self.email, "Starting sign-in confirmation");

        let mut attempts = 0;
        let mut last_linkless: Option<String> = None;
        let mut found = None;

        'attempts: for attempt in 1..=self.policy.max_attempts {
            attempts = attempt;
            let candidates = search::collect_candidates(
                &self.gmail,
                &self.queries,
                search::CANDIDATES_PER_QUERY,
            )
            .await?;
            debug!(attempt, candidates = candidates.len(), "Inspecting candidates");

            for candidate in candidates {
                let message = self
                    .gmail
                    .get_message(&candidate.id)
                    .await
                    .map_err(|err| SignInError::MailApi(err.to_string()))?;
                let Some(body) = gmail::message_body(&message) else {
                    warn!(message_id = %message.id, "Candidate message had no readable body");
                    last_linkless = Some(message.id.clone());
                    continue;
                };
                match extract::extract_sign_in_link(&body, self.link_domain_hint.as_deref()) {
                    Some(link) => {
                        info!(message_id = %message.id, attempt, "Sign-in link found");
                        found = Some((message, link, attempt));
                        break 'attempts;
                    }
                    None => {
                        debug!(message_id = %message.id, "No sign-in link in candidate");
                        last_linkless = Some(message.id.clone());
                    }
                }
            }

            if attempt < self.policy.max_attempts {
                let pause = self.policy.delay_for(attempt);
                debug!(attempt, seconds = pause.as_secs(), "Sign-in mail not ready, backing off");
                delay.sleep(pause).await;
            }
        }

        let Some((message, link, attempt)) = found else {
            // Distinguish "the mail never came" from "mail came without a link"
            return Err(match last_linkless {
                Some(message_id) => SignInError::LinkNotFound { message_id },
                None => SignInError::MessageNotFound { attempts },
            });
        };

        confirm::confirm_sign_in(&link, self.timeout).await?;
        info!(email = %self.email, message_id = %message.id, "Sign-in confirmed");

        // Cleanup is best effort. A mark-read failure never turns a confirmed
        // sign-in into a failure.
        let marked_read = match self.gmail.mark_read(&message.id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "Could not mark sign-in mail read");
                false
            }
        };

        Ok(SignInReport {
            email: self.email.clone(),
            message_id: message.id,
            link,
            attempts: attempt,
            marked_read,
        })
    }
}
