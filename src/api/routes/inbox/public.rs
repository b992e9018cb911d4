//! Public types for the inbox API
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct InboxLatestQuery {
    pub device: Option<String>,
    pub email: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Clone, Serialize)]
pub struct InboxMessage {
    pub id: String,
    pub received: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
}
