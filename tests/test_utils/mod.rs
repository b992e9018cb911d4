//! Test utilities for integration tests
use std::env;
use std::fs;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use axum::Router;

use mailkey::api::AppState;
use mailkey::api::app;
use mailkey::core::{AppConfig, MailboxDirectory};

/// Creates a test application router backed by a throwaway mailboxes file.
///
/// The directory holds one known mailbox with obviously fake credentials,
/// so handlers that reach for real OAuth fail fast instead of calling out.
/// Tests that use this fixture should carry `#[serial]` since they share
/// the process-wide temp directory.
pub async fn test_app() -> Router {
    // Unique directory per run, named by timestamp to avoid collisions
    let temp_dir = env::temp_dir();
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string();
    let dir = temp_dir.join(format!("mailkey-test-{}", ts));
    fs::create_dir_all(&dir).expect("Failed to create base directory");

    let mailboxes_path = dir.join("mailboxes.json");
    fs::write(
        &mailboxes_path,
        r#"{
  "default_email": "tv01@example.com",
  "mailboxes": {
    "tv01@example.com": {
      "client_id": "test_client_id",
      "client_secret": "test_client_secret",
      "redirect_uri": "urn:ietf:wg:oauth:2.0:oob",
      "refresh_token": "test_refresh_token"
    }
  },
  "devices": {
    "living-room-tv": "tv01@example.com"
  }
}"#,
    )
    .expect("Failed to write mailboxes file");

    let mailboxes = MailboxDirectory::load(mailboxes_path.to_str().unwrap())
        .expect("Failed to load mailboxes file");

    let app_config = AppConfig {
        mailboxes,
        signin_sender: String::from("no-reply@auth.example.com"),
        link_domain_hint: Some(String::from("auth.example.com")),
        max_attempts: 1,
        backoff_base_secs: 0,
        search_window_days: 1,
        http_timeout_secs: 2,
    };
    let app_state = AppState::new(app_config);
    app(Arc::new(RwLock::new(app_state)))
}
