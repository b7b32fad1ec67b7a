//! Live task accounting.
//!
//! Every owned background task holds a `TaskGuard`; the tracker's count
//! drops when the task returns, is aborted, or panics. Used to prove that
//! removal and shutdown leave no probers behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts live tasks of one kind.
#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    active: Arc<AtomicUsize>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live task. The returned guard must move into the task.
    pub fn track(&self) -> TaskGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the tracker when dropped.
#[derive(Debug)]
pub struct TaskGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
