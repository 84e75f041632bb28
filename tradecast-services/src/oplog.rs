//! Operational log sink
//!
//! Lifecycle and error events are traced locally and appended to an
//! operational log. Appends are best-effort and bounded by a timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Upper bound on a single append
pub const DEFAULT_APPEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Destination for operational log entries
#[async_trait]
pub trait OperationalLog: Send + Sync {
    async fn append(&self, message: &str, timestamp: DateTime<Utc>) -> Result<(), OpLogError>;
}

/// Errors that can occur while writing operational logs
#[derive(Debug, thiserror::Error)]
pub enum OpLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log stream not available: {0}")]
    Unavailable(String),
}

/// Traces a message and forwards it to the operational log
#[derive(Clone)]
pub struct OpsLogger {
    sink: Arc<dyn OperationalLog>,
    append_timeout: Duration,
}

impl OpsLogger {
    pub fn new(sink: Arc<dyn OperationalLog>) -> Self {
        Self {
            sink,
            append_timeout: DEFAULT_APPEND_TIMEOUT,
        }
    }

    pub fn with_append_timeout(mut self, append_timeout: Duration) -> Self {
        self.append_timeout = append_timeout;
        self
    }

    pub async fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.append(&message).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.append(&message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.append(&message).await;
    }

    async fn append(&self, message: &str) {
        match tokio::time::timeout(self.append_timeout, self.sink.append(message, Utc::now())).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to append operational log entry: {}", e),
            Err(_) => warn!(
                "Operational log append timed out after {:?}",
                self.append_timeout
            ),
        }
    }
}

impl std::fmt::Debug for OpsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsLogger")
            .field("append_timeout", &self.append_timeout)
            .finish()
    }
}

/// File-backed operational log
///
/// Each process writes to its own stream file inside the log group
/// directory. Lines are `<unix millis> <message>`.
#[derive(Debug)]
pub struct FileOperationalLog {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl FileOperationalLog {
    /// Create the log stream, making the group directory if needed.
    pub async fn create(
        group: impl AsRef<Path>,
        stream_name: &str,
    ) -> Result<Self, OpLogError> {
        let group = group.as_ref();
        tokio::fs::create_dir_all(group).await?;

        let path = group.join(stream_name);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!("Operational log stream created at {}", path.display());

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    /// Stream name for a process started at `started_at`
    pub fn stream_name_for(started_at: DateTime<Utc>) -> String {
        format!("log-stream-{}", started_at.timestamp())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OperationalLog for FileOperationalLog {
    async fn append(&self, message: &str, timestamp: DateTime<Utc>) -> Result<(), OpLogError> {
        let line = format!("{} {}\n", timestamp.timestamp_millis(), message);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// A recorded operational log entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory operational log (useful for testing)
#[derive(Debug, Default)]
pub struct MemoryOperationalLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryOperationalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Whether any entry contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }
}

#[async_trait]
impl OperationalLog for MemoryOperationalLog {
    async fn append(&self, message: &str, timestamp: DateTime<Utc>) -> Result<(), OpLogError> {
        self.entries.lock().push(LogEntry {
            message: message.to_string(),
            timestamp,
        });
        Ok(())
    }
}
