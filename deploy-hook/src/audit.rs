//! Append-only audit log of webhook and deployment activity.
//!
//! Every entry is written as `[YYYY-MM-DD HH:MM:SS] <message>` followed by a
//! newline. The file is opened, appended to and closed for each entry, and
//! appends are serialized so concurrent entries never mix within a line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Timestamp layout of an audit entry.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination for audit entries.
///
/// Appending never fails from the caller's point of view: a sink that cannot
/// persist an entry reports the problem through `tracing` and moves on.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, message: &str);
}

/// Render a single audit entry, including the trailing newline.
pub fn format_entry(timestamp: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", timestamp.format(TIMESTAMP_FORMAT), message)
}

/// Audit log backed by a plain text file.
pub struct FileAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, message: &str) {
        let entry = format_entry(Local::now(), message);

        let _guard = self.write_lock.lock().await;

        let mut file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "audit_log_open_failed");
                return;
            }
        };

        if let Err(e) = file.write_all(entry.as_bytes()).await {
            warn!(path = %self.path.display(), error = %e, "audit_log_write_failed");
            return;
        }

        if let Err(e) = file.flush().await {
            warn!(path = %self.path.display(), error = %e, "audit_log_flush_failed");
        }
    }
}
