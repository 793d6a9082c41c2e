//! 分发核心指标收集模块
//!
//! 基于 `metrics` facade 记录运行指标，并提供内存聚合器用于运行结束时的汇总。
//! 未安装 recorder 时所有记录函数均为空操作。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::CallResult;
use metrics::{counter, gauge, histogram};

/// Record one endpoint attempt
///
/// Called once per attempt, whichever dispatch operation issued it.
pub fn record_attempt(endpoint: &str, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ironnode_attempts_total",
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "ironnode_attempt_latency_ms",
        "endpoint" => endpoint.to_string()
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

/// Record the outcome of one dispatch operation
///
/// `outcome` is one of `success`, `failure`, `timeout`, `cancelled`.
pub fn record_dispatch(operation: &str, outcome: &str) {
    counter!(
        "ironnode_dispatch_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a finished pool task (`completed`, `failed`, `timed_out`, `panicked`)
pub fn record_task_finished(component: &str, outcome: &str) {
    counter!(
        "ironnode_tasks_total",
        "component" => component.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a submission refused because the queue stayed full or closed
pub fn record_task_rejected(component: &str) {
    counter!(
        "ironnode_tasks_rejected_total",
        "component" => component.to_string()
    )
    .increment(1);
}

/// Queue depth and occupancy
pub fn record_queue_depth(component: &str, depth: usize, capacity: usize) {
    gauge!("ironnode_queue_depth", "component" => component.to_string()).set(depth as f64);
    if capacity > 0 {
        gauge!("ironnode_queue_occupancy", "component" => component.to_string())
            .set(depth as f64 / capacity as f64);
    }
}

pub fn record_active_workers(component: &str, active: usize) {
    gauge!("ironnode_active_workers", "component" => component.to_string()).set(active as f64);
}

/// Record a log record written by `store`
pub fn record_log_persisted(store: &str, attempts: u32) {
    counter!("ironnode_log_persisted_total", "store" => store.to_string()).increment(1);
    histogram!("ironnode_log_persist_attempts", "store" => store.to_string())
        .record(f64::from(attempts));
}

/// Record a dropped log record (`queue_full`, `exhausted`, `closed`)
pub fn record_log_dropped(reason: &str) {
    counter!("ironnode_log_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Per-endpoint attempt aggregator
///
/// Keeps latency and failure counts in memory so a run can print a summary
/// without scraping the exporter.
#[derive(Debug, Clone, Default)]
pub struct DispatchAggregator {
    /// Dispatch operations observed
    pub operations: u64,

    /// Operations that resolved successfully
    pub succeeded: u64,

    /// Operations that ended in an error
    pub failed: u64,

    endpoints: BTreeMap<String, EndpointStats>,
}

#[derive(Debug, Clone, Default)]
struct EndpointStats {
    attempts: u64,
    failures: u64,
    latency_ms: RunningStats,
}

impl DispatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one attempt result into its endpoint's statistics
    pub fn update(&mut self, result: &CallResult) {
        let stats = self.endpoints.entry(result.endpoint.clone()).or_default();
        stats.attempts += 1;
        if !result.is_success() {
            stats.failures += 1;
        }
        stats
            .latency_ms
            .push(result.elapsed.as_secs_f64() * 1000.0);
    }

    /// Count a failed attempt whose latency was not reported
    pub fn record_failure(&mut self, endpoint: &str) {
        let stats = self.endpoints.entry(endpoint.to_string()).or_default();
        stats.attempts += 1;
        stats.failures += 1;
    }

    /// Count one dispatch operation
    pub fn record_operation(&mut self, success: bool) {
        self.operations += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Summary report
    pub fn summary(&self) -> DispatchSummary {
        let attempts = self.endpoints.values().map(|s| s.attempts).sum();
        let failures = self.endpoints.values().map(|s| s.failures).sum();

        DispatchSummary {
            operations: self.operations,
            succeeded: self.succeeded,
            failed: self.failed,
            attempts,
            failures,
            success_rate: percent(self.succeeded, self.operations),
            endpoints: self
                .endpoints
                .iter()
                .map(|(endpoint, stats)| EndpointSummary {
                    endpoint: endpoint.clone(),
                    attempts: stats.attempts,
                    failures: stats.failures,
                    failure_rate: percent(stats.failures, stats.attempts),
                    latency_ms: StatsSummary::from(&stats.latency_ms),
                })
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Aggregated dispatch summary
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub operations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub attempts: u64,
    pub failures: u64,
    pub success_rate: f64,
    /// Sorted by endpoint
    pub endpoints: Vec<EndpointSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct EndpointSummary {
    pub endpoint: String,
    pub attempts: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(
            f,
            "Operations: {} (succeeded {}, failed {}, {:.2}% success)",
            self.operations, self.succeeded, self.failed, self.success_rate
        )?;
        writeln!(f, "Attempts: {} ({} failed)", self.attempts, self.failures)?;

        if !self.endpoints.is_empty() {
            writeln!(f, "Per endpoint:")?;
            for endpoint in &self.endpoints {
                writeln!(
                    f,
                    "  {}: {} attempts, {:.2}% failed, latency ms {}",
                    endpoint.endpoint, endpoint.attempts, endpoint.failure_rate, endpoint.latency_ms
                )?;
            }
        }

        Ok(())
    }
}

/// Statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CallError, CallReply, EndpointCall};

    fn result(endpoint: &str, ms: u64, ok: bool) -> CallResult {
        let call = EndpointCall::new(endpoint, "eth_blockNumber", Bytes::new());
        let outcome = if ok {
            Ok(CallReply::new(Bytes::from_static(b"0x1"), Duration::from_millis(ms)))
        } else {
            Err(CallError::transport("connection reset"))
        };
        CallResult::from_outcome(&call, outcome, Duration::from_millis(ms))
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_groups_by_endpoint() {
        let mut aggregator = DispatchAggregator::new();
        aggregator.update(&result("node-b", 20, true));
        aggregator.update(&result("node-a", 10, true));
        aggregator.update(&result("node-a", 30, false));
        aggregator.record_operation(true);
        aggregator.record_operation(false);

        let summary = aggregator.summary();
        assert_eq!(summary.operations, 2);
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.failures, 1);
        assert!((summary.success_rate - 50.0).abs() < 1e-10);

        let names: Vec<_> = summary.endpoints.iter().map(|e| e.endpoint.as_str()).collect();
        assert_eq!(names, ["node-a", "node-b"]);

        let node_a = &summary.endpoints[0];
        assert_eq!(node_a.attempts, 2);
        assert_eq!(node_a.failures, 1);
        assert!((node_a.latency_ms.mean - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_failure_without_latency() {
        let mut aggregator = DispatchAggregator::new();
        aggregator.update(&result("node-a", 10, true));
        aggregator.record_failure("node-a");

        let summary = aggregator.summary();
        let node_a = &summary.endpoints[0];
        assert_eq!(node_a.attempts, 2);
        assert_eq!(node_a.failures, 1);
        assert_eq!(node_a.latency_ms.count, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DispatchAggregator::new();
        aggregator.update(&result("node-a", 12, true));
        aggregator.record_operation(true);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Operations: 1"));
        assert!(output.contains("100.00% success"));
        assert!(output.contains("node-a: 1 attempts"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DispatchAggregator::new().summary();
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(format!("{}", StatsSummary::default()), "N/A");
    }
}
