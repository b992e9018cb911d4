//! API routes module

pub mod inbox;
pub mod signin;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Sign-in confirmation routes
        .nest("/signin", signin::router())
        // Mailbox inspection routes
        .nest("/inbox", inbox::router())
}
