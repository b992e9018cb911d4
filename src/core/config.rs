use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// One OAuth credential set for a monitored mailbox.
///
/// Every field is required: a mailbox entry with any of them missing is a
/// configuration error and the process should fail before a sign-in attempt
/// is ever made.
#[derive(Clone, Deserialize)]
pub struct MailboxCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
}

/// Mask all secret material so credentials can never leak through debug
/// logging. Only the first few characters of the client id survive.
impl fmt::Debug for MailboxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxCredentials")
            .field("client_id", &mask(&self.client_id))
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"***")
            .finish()
    }
}

fn mask(value: &str) -> String {
    // Slice on a char boundary; the id is operator input and not always ASCII
    match value.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &value[..idx]),
        None => "***".to_string(),
    }
}

/// Lookup table mapping test devices to mailboxes and mailboxes to their
/// credential sets. Loaded once at startup from the JSON file named by
/// `MAILKEY_MAILBOXES_PATH` and never mutated afterwards.
///
/// Example file:
///
/// ```json
/// {
///   "default_email": "tvtest@example.com",
///   "mailboxes": {
///     "tvtest@example.com": {
///       "client_id": "...",
///       "client_secret": "...",
///       "redirect_uri": "urn:ietf:wg:oauth:2.0:oob",
///       "refresh_token": "..."
///     }
///   },
///   "devices": {
///     "10.21.4.17": "tvtest@example.com",
///     "firetv-lab-2": "tvtest@example.com"
///   }
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct MailboxDirectory {
    /// Mailbox used for devices without an explicit mapping
    pub default_email: String,
    /// Credential set per mailbox address
    pub mailboxes: HashMap<String, MailboxCredentials>,
    /// Device identity (IP address or lab name) to mailbox address
    #[serde(default)]
    pub devices: HashMap<String, String>,
}

impl MailboxDirectory {
    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mailboxes file at {}", path))?;
        let directory: MailboxDirectory = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse mailboxes file at {}", path))?;
        directory.validate()?;
        Ok(directory)
    }

    fn validate(&self) -> Result<()> {
        for (email, creds) in &self.mailboxes {
            for (field, value) in [
                ("client_id", &creds.client_id),
                ("client_secret", &creds.client_secret),
                ("redirect_uri", &creds.redirect_uri),
                ("refresh_token", &creds.refresh_token),
            ] {
                if value.is_empty() {
                    bail!("Mailbox {} is missing {}", email, field);
                }
            }
        }
        if !self.mailboxes.contains_key(&self.default_email) {
            bail!(
                "Default mailbox {} has no credential entry",
                self.default_email
            );
        }
        for (device, email) in &self.devices {
            if !self.mailboxes.contains_key(email) {
                bail!("Device {} maps to unknown mailbox {}", device, email);
            }
        }
        Ok(())
    }

    /// The mailbox a device identity resolves to. An explicit override wins,
    /// then the device mapping, then the default mailbox.
    pub fn mailbox_for(&self, identity: &str, email_override: Option<&str>) -> String {
        if let Some(email) = email_override {
            return email.to_string();
        }
        self.devices
            .get(identity)
            .cloned()
            .unwrap_or_else(|| self.default_email.clone())
    }

    pub fn credentials(&self, email: &str) -> Option<&MailboxCredentials> {
        self.mailboxes.get(email)
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub mailboxes: MailboxDirectory,
    /// Sender address the sign-in email comes from, used to build search
    /// queries
    pub signin_sender: String,
    /// Domain fragment a sign-in link must contain to be accepted, e.g.
    /// "auth.example.com". Unset accepts any http(s) link.
    pub link_domain_hint: Option<String>,
    /// Maximum number of search attempt cycles before giving up
    pub max_attempts: u32,
    /// Base backoff in seconds, scaled linearly by the attempt number
    pub backoff_base_secs: u64,
    /// Only consider messages newer than this many days
    pub search_window_days: i64,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mailboxes_path =
            env::var("MAILKEY_MAILBOXES_PATH").context("Missing env var MAILKEY_MAILBOXES_PATH")?;
        let mailboxes = MailboxDirectory::load(&mailboxes_path)?;
        let signin_sender =
            env::var("MAILKEY_SIGNIN_SENDER").context("Missing env var MAILKEY_SIGNIN_SENDER")?;
        let link_domain_hint = env::var("MAILKEY_LINK_DOMAIN").ok();
        let max_attempts = env_number("MAILKEY_MAX_ATTEMPTS", 3);
        let backoff_base_secs = env_number("MAILKEY_BACKOFF_BASE_SECS", 5);
        let search_window_days = env_number("MAILKEY_SEARCH_WINDOW_DAYS", 1);
        let http_timeout_secs = env_number("MAILKEY_HTTP_TIMEOUT_SECS", 30);

        Ok(Self {
            mailboxes,
            signin_sender,
            link_domain_hint,
            max_attempts,
            backoff_base_secs,
            search_window_days,
            http_timeout_secs,
        })
    }
}

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
