//! Web server module for receiving push webhooks.
//!
//! This module provides a thin web server that:
//! - Verifies the HMAC signature of each push webhook
//! - Starts the matching deployment in the background
//! - Returns 202 Accepted without waiting for the deployment
//!
//! Deployment results only ever reach the audit log.

pub mod error;
pub mod handlers;
pub mod payload;
pub mod signature;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use error::WebhookError;
pub use handlers::{deploy_webhook, health, method_not_allowed, AppState};
pub use payload::{parse_event, PushPayload};
pub use signature::{expected_signature, verify_signature, SIGNATURE_HEADER};

/// Build the HTTP router.
///
/// - `POST /webhook`: signed push webhook
/// - `GET /health`: liveness check
pub fn router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health).fallback(method_not_allowed))
        .route(
            "/webhook",
            post(deploy_webhook).fallback(method_not_allowed),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(map_response(plain_text_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Give the bare 408 produced by `TimeoutLayer` a plain-text body.
async fn plain_text_timeout(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && !response.headers().contains_key(CONTENT_TYPE)
    {
        return (StatusCode::REQUEST_TIMEOUT, "Request timeout").into_response();
    }
    response
}
