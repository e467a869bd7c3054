//! Queue bookkeeping - which paths are pending and which one is in flight.
//!
//! The channel carries the jobs themselves; this state exists so a path is
//! never submitted twice while an earlier submission is still outstanding.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct QueueState {
    pending: IndexSet<PathBuf>,
    in_flight: Option<PathBuf>,
}

pub type SharedQueueState = Arc<Mutex<QueueState>>;

pub fn new_state() -> SharedQueueState {
    Arc::new(Mutex::new(QueueState::default()))
}

/// Lock the state, recovering from a poisoned mutex.
///
/// The state is a plain set plus an option; a panic elsewhere cannot leave it
/// half-updated, so the inner value is still usable.
pub fn lock(state: &SharedQueueState) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueueState {
    pub fn is_queued(&self, path: &Path) -> bool {
        self.pending.contains(path) || self.in_flight.as_deref() == Some(path)
    }

    /// Reserve a slot for `path`. Returns false if it is already pending or in flight.
    pub fn reserve(&mut self, path: &Path) -> bool {
        if self.is_queued(path) {
            return false;
        }
        self.pending.insert(path.to_path_buf())
    }

    /// Undo a reservation whose job never reached the worker
    pub fn release(&mut self, path: &Path) {
        self.pending.shift_remove(path);
    }

    pub fn begin(&mut self, path: &Path) {
        self.pending.shift_remove(path);
        self.in_flight = Some(path.to_path_buf());
    }

    pub fn finish(&mut self, path: &Path) {
        if self.in_flight.as_deref() == Some(path) {
            self.in_flight = None;
        }
    }

    /// Drop every pending reservation, returning how many were dropped
    pub fn abandon_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending paths in submission order
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.pending.iter().cloned().collect()
    }

    pub fn in_flight(&self) -> Option<PathBuf> {
        self.in_flight.clone()
    }
}
