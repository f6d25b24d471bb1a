//! Running the external deploy script.
//!
//! The script is called as `<runner> <script> <project> <clone_url>`. Its
//! stdout and stderr are merged into a single stream in arrival order, and the
//! script with everything it started is killed once the task deadline passes.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout_at;
use tracing::{info, warn};

use super::types::DeploymentTask;

const READ_CHUNK_SIZE: usize = 8192;

/// Default cap on captured script output.
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// Why a deployment did not succeed.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to start deploy script: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed while running deploy script: {0}")]
    Io(#[source] io::Error),

    #[error("deploy script failed with {0}")]
    ExitStatus(ExitStatus),

    #[error("deploy script timed out after {}s and was killed", .0.as_secs_f64())]
    TimedOut(Duration),
}

/// Result of one run: whatever was printed, and how it ended.
#[derive(Debug)]
pub struct RunOutcome {
    pub output: Vec<u8>,
    pub result: Result<(), DeployError>,
}

impl RunOutcome {
    pub fn failed(error: DeployError) -> Self {
        Self {
            output: Vec::new(),
            result: Err(error),
        }
    }
}

/// Executes the deploy action for a task.
///
/// Implementations must return by the task deadline (give or take the time
/// needed to kill the action).
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, task: &DeploymentTask) -> RunOutcome;
}

/// Runs a script through an interpreter, e.g. `/bin/bash deploy.sh`.
///
/// On unix the script leads its own process group, so a timeout kills every
/// command it started, not just the interpreter.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    runner: PathBuf,
    script: PathBuf,
    output_limit: usize,
}

impl ScriptRunner {
    pub fn new(runner: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            script: script.into(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Keep at most `limit` bytes of script output.
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }
}

#[async_trait]
impl ProcessRunner for ScriptRunner {
    async fn run(&self, task: &DeploymentTask) -> RunOutcome {
        let mut command = Command::new(&self.runner);
        command
            .arg(&self.script)
            .arg(&task.project_name)
            .arg(&task.source_location)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    project = %task.project_name,
                    runner = %self.runner.display(),
                    error = %e,
                    "deploy_spawn_failed"
                );
                return RunOutcome::failed(DeployError::Spawn(e));
            }
        };

        let pid = child.id();
        info!(
            project = %task.project_name,
            pid = ?pid,
            "deploy_process_spawned"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut output = CapturedOutput::new(self.output_limit);

        let finished = timeout_at(task.deadline, async {
            let (read, status) =
                tokio::join!(read_combined(stdout, stderr, &mut output), child.wait());
            read.and(status)
        })
        .await;

        let result = match finished {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DeployError::ExitStatus(status)),
            Ok(Err(e)) => Err(DeployError::Io(e)),
            Err(_) => {
                terminate(&mut child, pid, &task.project_name).await;
                Err(DeployError::TimedOut(task.timeout()))
            }
        };

        if output.discarded > 0 {
            warn!(
                project = %task.project_name,
                kept = output.bytes.len(),
                discarded = output.discarded,
                "deploy_output_truncated"
            );
        }

        RunOutcome {
            output: output.into_bytes(),
            result,
        }
    }
}

/// Kill the script and everything it started, then reap it.
async fn terminate(child: &mut Child, pid: Option<u32>, project: &str) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            if let Err(e) = kill_process_group(pid) {
                warn!(project = %project, pid = pid, error = %e, "deploy_group_kill_failed");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        warn!(project = %project, error = %e, "deploy_kill_failed");
    }
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    killpg(Pid::from_raw(pgid), Signal::SIGKILL).map_err(io::Error::from)
}

/// Script output, capped at a byte limit.
///
/// Bytes past the limit are counted and dropped; the pipes keep being drained
/// so the script never blocks on a full pipe.
#[derive(Debug)]
struct CapturedOutput {
    bytes: Vec<u8>,
    limit: usize,
    discarded: usize,
}

impl CapturedOutput {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            discarded: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let kept = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..kept]);
        self.discarded += chunk.len() - kept;
    }

    /// The kept output, followed by a note when anything was dropped.
    fn into_bytes(mut self) -> Vec<u8> {
        if self.discarded > 0 {
            self.bytes.extend_from_slice(
                format!("\n[{} bytes of output truncated]\n", self.discarded).as_bytes(),
            );
        }
        self.bytes
    }
}

/// Drain both pipes into `output`, interleaving chunks as they arrive.
async fn read_combined<O, E>(
    mut stdout: Option<O>,
    mut stderr: Option<E>,
    output: &mut CapturedOutput,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_chunk = [0u8; READ_CHUNK_SIZE];
    let mut err_chunk = [0u8; READ_CHUNK_SIZE];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            n = read_chunk(&mut stdout, &mut out_chunk) => match n? {
                0 => stdout = None,
                n => output.push(&out_chunk[..n]),
            },
            n = read_chunk(&mut stderr, &mut err_chunk) => match n? {
                0 => stderr = None,
                n => output.push(&err_chunk[..n]),
            },
        }
    }

    Ok(())
}

/// Read from an optional pipe; a closed (`None`) pipe never becomes ready.
async fn read_chunk<R>(reader: &mut Option<R>, chunk: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read(chunk).await,
        None => std::future::pending().await,
    }
}
