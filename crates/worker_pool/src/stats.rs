//! Pool statistics

use std::sync::{PoisonError, RwLock};

/// Queue occupancy above which a pool reports unhealthy
pub const UNHEALTHY_OCCUPANCY: f64 = 0.9;

/// Live snapshot of pool statistics
///
/// Counters are cumulative since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Submissions refused because the grace period elapsed or the pool was closed
    pub tasks_rejected: u64,
    /// Workers currently alive
    pub active_workers: usize,
    /// Workers spawned so far
    pub total_workers: usize,
    /// Requested worker count, may be below `total_workers` after a shrink
    pub target_workers: usize,
    pub queue_length: usize,
    pub queue_capacity: usize,
}

impl PoolStats {
    /// Fraction of the queue in use
    pub fn occupancy(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 1.0;
        }
        self.queue_length as f64 / self.queue_capacity as f64
    }

    /// False above 90% occupancy or without a live worker
    pub fn is_healthy(&self) -> bool {
        self.occupancy() <= UNHEALTHY_OCCUPANCY && self.active_workers > 0
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: u64,
    failed: u64,
    rejected: u64,
    active: usize,
    total: usize,
    target: usize,
}

/// Counters behind a single reader/writer lock
#[derive(Debug, Default)]
pub(crate) struct StatsCell {
    inner: RwLock<Counters>,
}

impl StatsCell {
    fn write<R>(&self, f: impl FnOnce(&mut Counters) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn task_finished(&self, success: bool) {
        self.write(|c| {
            if success {
                c.completed += 1;
            } else {
                c.failed += 1;
            }
        });
    }

    pub(crate) fn task_rejected(&self) {
        self.write(|c| c.rejected += 1);
    }

    /// Returns the live worker count after the change
    pub(crate) fn worker_started(&self) -> usize {
        self.write(|c| {
            c.active += 1;
            c.active
        })
    }

    pub(crate) fn worker_stopped(&self) -> usize {
        self.write(|c| {
            c.active = c.active.saturating_sub(1);
            c.active
        })
    }

    /// Record a resize request; returns how many workers to spawn
    pub(crate) fn resize(&self, target: usize) -> usize {
        self.write(|c| {
            c.target = target;
            let grow = target.saturating_sub(c.total);
            c.total += grow;
            grow
        })
    }

    pub(crate) fn snapshot(&self, queue_length: usize, queue_capacity: usize) -> PoolStats {
        let c = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        PoolStats {
            tasks_completed: c.completed,
            tasks_failed: c.failed,
            tasks_rejected: c.rejected,
            active_workers: c.active,
            total_workers: c.total,
            target_workers: c.target,
            queue_length: queue_length.min(queue_capacity),
            queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(queue_length: usize, active_workers: usize) -> PoolStats {
        PoolStats {
            active_workers,
            total_workers: active_workers,
            queue_length,
            queue_capacity: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_health_thresholds() {
        assert!(stats(9, 1).is_healthy());
        assert!(!stats(10, 1).is_healthy());
        assert!(!stats(0, 0).is_healthy());
    }

    #[test]
    fn test_resize_grows_only() {
        let cell = StatsCell::default();
        assert_eq!(cell.resize(3), 3);
        assert_eq!(cell.resize(1), 0);
        assert_eq!(cell.resize(5), 2);

        let snapshot = cell.snapshot(0, 4);
        assert_eq!(snapshot.total_workers, 5);
        assert_eq!(snapshot.target_workers, 5);
    }

    #[test]
    fn test_counters() {
        let cell = StatsCell::default();
        cell.task_finished(true);
        cell.task_finished(false);
        cell.task_rejected();
        assert_eq!(cell.worker_started(), 1);
        assert_eq!(cell.worker_stopped(), 0);
        assert_eq!(cell.worker_stopped(), 0);

        let snapshot = cell.snapshot(7, 4);
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.tasks_rejected, 1);
        assert_eq!(snapshot.queue_length, 4);
    }
}
