//! Fire-and-forget deployment dispatch.
//!
//! Each dispatch runs on its own tokio task and reports to the audit log:
//! a start entry, the script output, then a success or error entry. Nothing
//! is returned to the caller, and overlapping dispatches for the same project
//! are not prevented.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::runner::ProcessRunner;
use super::types::DeploymentTask;
use crate::audit::AuditLog;

/// Starts deployments in the background.
#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<dyn ProcessRunner>,
    audit: Arc<dyn AuditLog>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        audit: Arc<dyn AuditLog>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            audit,
            timeout,
        }
    }

    /// Start a deployment without waiting for it.
    ///
    /// The returned handle can be dropped; the task keeps running until the
    /// deploy action finishes or its deadline passes.
    pub fn dispatch(
        &self,
        project_name: impl Into<String>,
        source_location: impl Into<String>,
    ) -> JoinHandle<()> {
        let task = DeploymentTask::start(project_name, source_location, self.timeout);
        let dispatcher = self.clone();

        tokio::spawn(async move { dispatcher.run(task).await })
    }

    async fn run(&self, task: DeploymentTask) {
        info!(
            project = %task.project_name,
            source = %task.source_location,
            timeout_seconds = self.timeout.as_secs_f64(),
            "deploy_started"
        );
        self.audit
            .append(&format!(
                "Running deploy script for project: {}",
                task.project_name
            ))
            .await;

        let outcome = self.runner.run(&task).await;
        let elapsed = task.started_at.elapsed();

        self.audit
            .append(&String::from_utf8_lossy(&outcome.output))
            .await;

        match outcome.result {
            Ok(()) => {
                info!(
                    project = %task.project_name,
                    output_length = outcome.output.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "deploy_succeeded"
                );
                self.audit
                    .append(&format!(
                        "Deployment success for project: {}",
                        task.project_name
                    ))
                    .await;
            }
            Err(e) => {
                error!(
                    project = %task.project_name,
                    output_length = outcome.output.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "deploy_failed"
                );
                self.audit.append(&format!("Deployment error: {}", e)).await;
            }
        }
    }
}
