use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for the map stage, safe to poll while workers update them.
///
/// One tracker serves one run at a time; overlapping runs would interleave
/// their counts.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: AtomicUsize,
    completed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub total: usize,
    pub completed: usize,
}

impl ProgressState {
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressState {
        ProgressState {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
        }
    }
}
