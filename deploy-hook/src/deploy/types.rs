//! Deployment types.
//!
//! - `WebhookEvent`: what an accepted webhook asks for
//! - `DeploymentTask`: one in-flight run of the deploy script

use std::time::Duration;

use tokio::time::Instant;

/// Longest run any task is given; larger timeouts are clamped to this.
pub const MAX_TASK_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A verified request to deploy a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Lowercased repository name
    pub project_name: String,
    /// Clone URL handed to the deploy script
    pub source_location: String,
}

impl WebhookEvent {
    /// Build an event, normalizing the repository name to lowercase.
    pub fn new(repository_name: &str, source_location: impl Into<String>) -> Self {
        Self {
            project_name: repository_name.to_lowercase(),
            source_location: source_location.into(),
        }
    }
}

/// A single deployment run, bounded by a deadline.
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    pub project_name: String,
    pub source_location: String,
    pub started_at: Instant,
    pub deadline: Instant,
}

impl DeploymentTask {
    /// Start a task now, expiring `timeout` (at most `MAX_TASK_TIMEOUT`) from now.
    pub fn start(
        project_name: impl Into<String>,
        source_location: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let started_at = Instant::now();
        let timeout = timeout.min(MAX_TASK_TIMEOUT);
        Self {
            project_name: project_name.into(),
            source_location: source_location.into(),
            started_at,
            deadline: started_at + timeout,
        }
    }

    /// Configured run time allowed for this task.
    pub fn timeout(&self) -> Duration {
        self.deadline - self.started_at
    }
}
