pub mod config;
pub use config::{AppConfig, MailboxCredentials, MailboxDirectory};
