//! Drain-then-force-stop shutdown shared by every queue-backed service

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Lifecycle state of a queue-backed service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Workers are being spawned
    Starting,
    /// Accepting and executing tasks
    Running,
    /// Queue closed, finishing in-flight and queued work
    Draining,
    /// All workers exited or were force-stopped
    Stopped,
}

/// Result of a shutdown; never an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued and in-flight task finished within the timeout
    Completed,
    /// The timeout elapsed and the lifetime token was cancelled
    ForceStopped,
}

impl ShutdownOutcome {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Wait up to `timeout` for every tracked worker, then cancel `lifetime`
///
/// The caller closes its queue first. Safe to call repeatedly.
pub async fn drain(
    component: &str,
    tracker: &TaskTracker,
    lifetime: &CancellationToken,
    timeout: Duration,
) -> ShutdownOutcome {
    tracker.close();

    if tokio::time::timeout(timeout, tracker.wait()).await.is_ok() {
        info!(component, "all workers finished");
        ShutdownOutcome::Completed
    } else {
        lifetime.cancel();
        warn!(
            component,
            timeout_ms = timeout.as_millis() as u64,
            remaining_workers = tracker.len(),
            "shutdown timeout, forcing stop"
        );
        ShutdownOutcome::ForceStopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_completes() {
        let tracker = TaskTracker::new();
        let lifetime = CancellationToken::new();
        tracker.spawn(tokio::time::sleep(Duration::from_millis(10)));

        let outcome = drain("test", &tracker, &lifetime, Duration::from_secs(1)).await;

        assert_eq!(outcome, ShutdownOutcome::Completed);
        assert!(!lifetime.is_cancelled());
    }

    #[tokio::test]
    async fn test_drain_force_stops() {
        let tracker = TaskTracker::new();
        let lifetime = CancellationToken::new();
        let token = lifetime.clone();
        tracker.spawn(async move { token.cancelled().await });

        let outcome = drain("test", &tracker, &lifetime, Duration::from_millis(20)).await;
        assert_eq!(outcome, ShutdownOutcome::ForceStopped);
        assert!(lifetime.is_cancelled());

        // The cancelled worker exits, so a second drain completes.
        let again = drain("test", &tracker, &lifetime, Duration::from_secs(1)).await;
        assert!(again.is_completed());
    }
}
