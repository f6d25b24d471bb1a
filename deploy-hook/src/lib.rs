//! deploy-hook - Auto-deploy on push.
//!
//! This library backs the `deploy-hook` binary, a small web server that:
//! - Authenticates push webhooks with an HMAC-SHA256 signature
//! - Runs a deploy script for the pushed project in the background
//! - Records every attempt in an append-only audit log
//!
//! ## Architecture
//!
//! ```text
//! Push webhook → Web Server → signature check → Dispatcher → deploy script
//!                                                    ↓
//!                                                audit log
//! ```

pub mod audit;
pub mod config;
pub mod deploy;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use audit::{AuditLog, FileAuditLog};
pub use config::{Config, ConfigError, SharedSecret};
pub use deploy::{
    DeployError, DeploymentTask, Dispatcher, ProcessRunner, RunOutcome, ScriptRunner,
    WebhookEvent,
};
pub use web::{router, AppState};
