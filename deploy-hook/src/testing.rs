//! In-memory collaborators for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::audit::AuditLog;
use crate::deploy::{DeploymentTask, ProcessRunner, RunOutcome};

/// Audit log that keeps messages (without timestamps) in memory.
#[derive(Default)]
pub struct MemoryAuditLog {
    messages: Mutex<Vec<String>>,
}

impl MemoryAuditLog {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

enum Behaviour {
    Output(Vec<u8>),
    Echo,
    Custom(Box<dyn Fn() -> RunOutcome + Send + Sync>),
}

/// Process runner that records its invocations instead of running anything.
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, String)>>,
    behaviour: Behaviour,
    gate: Option<Semaphore>,
}

impl RecordingRunner {
    fn new(behaviour: Behaviour, gated: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            behaviour,
            gate: gated.then(|| Semaphore::new(0)),
        }
    }

    /// Succeeds with a fixed output.
    pub fn succeeding(output: &[u8]) -> Self {
        Self::new(Behaviour::Output(output.to_vec()), false)
    }

    /// Succeeds with `deployed <project>\n` as output.
    pub fn echoing() -> Self {
        Self::new(Behaviour::Echo, false)
    }

    /// Returns whatever `outcome` builds.
    pub fn with_outcome<F>(outcome: F) -> Self
    where
        F: Fn() -> RunOutcome + Send + Sync + 'static,
    {
        Self::new(Behaviour::Custom(Box::new(outcome)), false)
    }

    /// Blocks every run until [`RecordingRunner::release`] is called.
    pub fn gated() -> Self {
        Self::new(Behaviour::Output(Vec::new()), true)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` runs have started.
    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("runner was not invoked in time");
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, task: &DeploymentTask) -> RunOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((task.project_name.clone(), task.source_location.clone()));

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        match &self.behaviour {
            Behaviour::Output(output) => RunOutcome {
                output: output.clone(),
                result: Ok(()),
            },
            Behaviour::Echo => RunOutcome {
                output: format!("deployed {}\n", task.project_name).into_bytes(),
                result: Ok(()),
            },
            Behaviour::Custom(build) => build(),
        }
    }
}
