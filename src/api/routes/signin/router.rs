//! Router for the sign-in API

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json, Response},
};
use http::StatusCode;

use super::public;
use crate::api::state::AppState;
use crate::signin::{SignInError, SignInFlow, retry::TokioDelay};

type SharedState = Arc<RwLock<AppState>>;

async fn signin_handler(
    State(state): State<SharedState>,
    Json(params): Json<public::SignInRequest>,
) -> Response {
    let config = {
        let shared_state = state.read().expect("Unable to read shared state");
        shared_state.config.clone()
    };

    let device = params.device.unwrap_or_default();
    let result = match SignInFlow::new(&config, &device, params.email.as_deref()).await {
        Ok(flow) => flow.run(&TokioDelay).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(report) => (
            StatusCode::OK,
            Json(public::SignInResponse {
                success: true,
                email: report.email,
                message_id: report.message_id,
                attempts: report.attempts,
                marked_read: report.marked_read,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(stage = %err.stage(), "Sign-in failed: {}", err);
            let status = match &err {
                SignInError::MissingCredentials(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SignInError::MessageNotFound { .. } | SignInError::LinkNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(public::SignInFailure {
                    success: false,
                    stage: err.stage(),
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Create the sign-in router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", axum::routing::post(signin_handler))
}
