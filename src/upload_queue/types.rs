//! Type definitions for the upload queue system.
//!
//! Defines core data structures: WatchedFile, UploadJob, UploadOutcome, QueueStatus, and constants.

use crate::counters::CounterSnapshot;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;

/// The only response body that confirms an upload. Compared byte for byte.
pub const SUCCESS_SENTINEL: &str = "OK, photo received.";

/// Multipart field names expected by the booth server
pub const USERNAME_FIELD: &str = "username";
pub const PASSWORD_FIELD: &str = "password";
pub const PHOTO_FIELD: &str = "photo";

// Exactly one upload in flight at any time; jobs run in submission order
pub const QUEUE_CONCURRENCY: usize = 1;

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(120);

/// A file discovered under the watched directory, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub discovered_at: DateTime<Utc>,
}

impl WatchedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// One unit of work owned by the queue until it has run.
#[derive(Debug)]
pub struct UploadJob {
    pub id: String,
    pub file: WatchedFile,
    pub queued_at: DateTime<Utc>,
    pub(crate) completion: oneshot::Sender<UploadOutcome>,
}

/// Why an upload did not count as confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Server answered 2xx but not with the success sentinel
    UnexpectedBody(String),
    /// Non-2xx answer
    BadStatus(u16),
    /// Network error, connection reset, unreadable file
    Transport(String),
    /// Per-job timeout elapsed before the upload resolved
    TimedOut,
    /// The upload task panicked
    Panicked,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::UnexpectedBody(body) => write!(f, "unexpected response body {:?}", body),
            FailureReason::BadStatus(status) => write!(f, "server answered with status {}", status),
            FailureReason::Transport(message) => write!(f, "transport failure: {}", message),
            FailureReason::TimedOut => write!(f, "upload timed out"),
            FailureReason::Panicked => write!(f, "upload task panicked"),
        }
    }
}

/// Classification of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Server confirmed the upload. `removed` is false when deleting the local copy failed.
    Success { removed: bool },
    Failure(FailureReason),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

/// Result of handing a file to the queue.
#[derive(Debug)]
pub enum EnqueueResult {
    Queued(JobTicket),
    /// The same path is already pending or in flight
    AlreadyQueued,
}

/// Resolves once the queue has finished the job.
#[derive(Debug)]
pub struct JobTicket {
    pub id: String,
    pub path: PathBuf,
    pub(crate) outcome_rx: oneshot::Receiver<UploadOutcome>,
}

impl JobTicket {
    /// Wait for the job's outcome. `None` if the queue shut down before running it.
    pub async fn outcome(self) -> Option<UploadOutcome> {
        self.outcome_rx.await.ok()
    }
}

#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub pending: usize,
    pub in_flight: Option<PathBuf>,
    pub counters: CounterSnapshot,
}

/// Base name of a path for log lines
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
