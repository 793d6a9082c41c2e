//! Linear backoff shared by dispatcher retries and logger persistence

use std::time::Duration;

/// Linear backoff: the wait after attempt `n` (1-based) is `n × base`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn linear(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Wait after `attempt` before the next one
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// Total wait across `attempts` attempts (no wait after the last)
    pub fn total(&self, attempts: u32) -> Duration {
        (1..attempts).map(|n| self.delay(n)).sum()
    }
}
