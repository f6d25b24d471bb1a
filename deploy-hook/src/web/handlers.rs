//! Webhook endpoint handlers.
//!
//! The webhook handler only authenticates and parses the request, then hands
//! the deployment to the dispatcher and answers `202 Accepted` right away. It
//! never waits for the deploy script.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::deploy::Dispatcher;
use crate::web::error::WebhookError;
use crate::web::payload::parse_event;
use crate::web::signature::{verify_signature, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub audit: Arc<dyn AuditLog>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            audit,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Answer for a known path requested with the wrong method.
pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

// =============================================================================
// Deploy Webhook
// =============================================================================

/// Push webhook endpoint.
///
/// This endpoint:
/// 1. Requires the `X-Hub-Signature-256` header
/// 2. Reads the raw body and verifies its HMAC signature
/// 3. Parses the repository name and clone URL
/// 4. Starts the deployment in the background and returns 202
pub async fn deploy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, String), WebhookError> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        // A non-UTF-8 value cannot match and is treated as a bad signature
        Some(value) if !value.is_empty() => value.to_str().unwrap_or_default(),
        _ => {
            warn!("webhook_signature_missing");
            state.audit.append("Missing signature").await;
            return Err(WebhookError::MissingSignature);
        }
    };

    let body = axum::body::to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| {
            warn!(error = %e, "webhook_body_unreadable");
            WebhookError::UnreadableBody(e)
        })?;

    if !verify_signature(state.config.webhook_secret.as_bytes(), &body, signature) {
        warn!(body_length = body.len(), "webhook_signature_invalid");
        state.audit.append("Invalid signature").await;
        return Err(WebhookError::InvalidSignature);
    }

    let event = parse_event(&body).map_err(|e| {
        warn!(error = %e, "webhook_payload_invalid");
        WebhookError::InvalidJson(e)
    })?;

    info!(
        project = %event.project_name,
        source = %event.source_location,
        "webhook_accepted"
    );
    state
        .audit
        .append(&format!(
            "Webhook triggered for project: {}",
            event.project_name
        ))
        .await;

    // Fire and forget: the deployment reports through the audit log
    let _ = state
        .dispatcher
        .dispatch(event.project_name.clone(), event.source_location);

    Ok((
        StatusCode::ACCEPTED,
        format!("Deployment started for project: {}", event.project_name),
    ))
}
