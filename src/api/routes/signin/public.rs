//! Public types for the sign-in API
use serde::{Deserialize, Serialize};

use crate::signin::SignInStage;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub device: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Serialize)]
pub struct SignInResponse {
    pub success: bool,
    pub email: String,
    pub message_id: String,
    pub attempts: u32,
    pub marked_read: bool,
}

#[derive(Clone, Serialize)]
pub struct SignInFailure {
    pub success: bool,
    pub stage: SignInStage,
    pub error: String,
}
