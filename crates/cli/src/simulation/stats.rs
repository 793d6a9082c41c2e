//! Simulation run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DispatchSummary;
use worker_pool::PoolStats;
use write_behind::LoggerStats;

use super::SimulationMode;
use crate::services::ServicesShutdown;

/// Statistics from one simulation run
#[derive(Debug, Clone)]
pub struct SimulationStats {
    pub mode: SimulationMode,

    /// Requests the run was asked to play
    pub requests: usize,

    /// Requests accepted by the worker pool
    pub submitted: usize,

    /// Requests the pool refused
    pub rejected: usize,

    /// Wall time from first submission to the end of shutdown
    pub duration: Duration,

    /// Per-endpoint attempt statistics
    pub dispatch: DispatchSummary,

    /// Dispatcher counters
    pub dispatcher: MetricsSnapshot,

    pub pool: PoolStats,

    pub logger: LoggerStats,

    pub shutdown: ServicesShutdown,
}

impl SimulationStats {
    /// Completed dispatch operations per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatch.operations as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Records lost by the logger, for any reason
    pub fn dropped_logs(&self) -> u64 {
        self.logger.dropped_queue_full + self.logger.dropped_closed + self.logger.dropped_exhausted
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Simulation Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Mode: {}", self.mode.as_str());
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Requests: {} ({} submitted, {} rejected)",
            self.requests, self.submitted, self.rejected
        );
        println!("   └─ Throughput: {:.2} ops/s", self.throughput());

        println!("\n🔀 Dispatcher");
        println!(
            "   ├─ Operations: {} ({} succeeded, {} failed, {} interrupted)",
            self.dispatcher.operations,
            self.dispatcher.succeeded,
            self.dispatcher.failed,
            self.dispatcher.interrupted
        );
        println!(
            "   └─ Attempts: {} ({} failed)",
            self.dispatcher.attempts, self.dispatcher.attempt_failures
        );

        println!("\n⚙️  Worker Pool");
        println!("   ├─ Completed: {}", self.pool.tasks_completed);
        println!("   ├─ Failed: {}", self.pool.tasks_failed);
        println!("   ├─ Rejected: {}", self.pool.tasks_rejected);
        println!("   └─ Shutdown: {:?}", self.shutdown.pool);

        println!("\n📝 Request Log");
        println!("   ├─ Persisted: {}", self.logger.persisted);
        println!("   ├─ Dropped (queue full): {}", self.logger.dropped_queue_full);
        println!("   ├─ Dropped (closed): {}", self.logger.dropped_closed);
        println!("   ├─ Dropped (retries exhausted): {}", self.logger.dropped_exhausted);
        println!("   └─ Shutdown: {:?}", self.shutdown.logger);

        println!("\n{}", self.dispatch);
    }
}
