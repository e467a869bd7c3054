//! Running totals of upload outcomes.
//!
//! Owned explicitly and shared by `Arc`: the queue's completion path is the
//! only writer, the status notifier only reads snapshots.

use crate::upload_queue::UploadOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct UploadCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the counters.
///
/// Taken field by field, so a snapshot racing a completion may be one job stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub succeeded: u64,
    pub failed: u64,
}

impl CounterSnapshot {
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

impl UploadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &UploadOutcome) {
        if outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}
