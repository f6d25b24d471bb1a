//! Deployment module.
//!
//! This module provides:
//! - Types describing a requested deployment and an in-flight run
//! - The `ProcessRunner` seam and the script-based runner
//! - The `Dispatcher`, which runs deployments in the background
//!
//! ## Flow
//!
//! ```text
//! WebhookEvent → Dispatcher::dispatch() → tokio task → ProcessRunner → audit log
//! ```

pub mod dispatcher;
pub mod runner;
pub mod types;

pub use dispatcher::Dispatcher;
pub use runner::{DeployError, ProcessRunner, RunOutcome, ScriptRunner};
pub use types::{DeploymentTask, WebhookEvent};
