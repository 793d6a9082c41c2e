//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Operations started (validation failures excluded)
    operations: AtomicU64,
    /// Operations that produced a usable result
    succeeded: AtomicU64,
    /// Operations that ended in an aggregate failure
    failed: AtomicU64,
    /// Operations interrupted by deadline or cancellation
    interrupted: AtomicU64,
    /// Individual attempts issued
    attempts: AtomicU64,
    /// Individual attempts that reported an error
    attempt_failures: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_operations(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_attempts(&self, n: u64) {
        self.attempts.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_attempt_failures(&self) {
        self.attempt_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            attempt_failures: self.attempt_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub interrupted: u64,
    pub attempts: u64,
    pub attempt_failures: u64,
}
