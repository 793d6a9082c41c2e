//! Configuration contracts shared across crates.
//!
//! Every field has a documented default so an empty file is a valid config.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::NodeDescriptor;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete dispatch core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CoreConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatcherSettings,

    #[serde(default)]
    #[validate(nested)]
    pub worker_pool: WorkerPoolSettings,

    #[serde(default)]
    #[validate(nested)]
    pub request_log: RequestLogSettings,

    /// Upstream node registry
    #[serde(default)]
    #[validate(nested)]
    pub nodes: Vec<NodeDescriptor>,
}

/// Fan-out dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatcherSettings {
    /// Default per-operation deadline (default 10000)
    #[serde(default = "default_dispatch_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Retry backoff base interval (default 100)
    #[serde(default = "default_retry_base_interval_ms")]
    #[validate(range(min = 1))]
    pub retry_base_interval_ms: u64,

    /// Retry bound callers use when they have no better value (default 3)
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,
}

impl DispatcherSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_interval(&self) -> Duration {
        Duration::from_millis(self.retry_base_interval_ms)
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_dispatch_timeout_ms(),
            retry_base_interval_ms: default_retry_base_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Bounded worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerPoolSettings {
    /// Worker count (default 10)
    #[serde(default = "default_pool_workers")]
    #[validate(range(min = 1, max = 4096))]
    pub workers: usize,

    /// Task queue capacity (default 1000)
    #[serde(default = "default_pool_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Advisory per-task deadline (default 30000)
    #[serde(default = "default_task_timeout_ms")]
    #[validate(range(min = 1))]
    pub task_timeout_ms: u64,

    /// Grace period of `submit` (default 100)
    #[serde(default = "default_submit_grace_ms")]
    #[validate(range(min = 1))]
    pub submit_grace_ms: u64,
}

impl WorkerPoolSettings {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn submit_grace(&self) -> Duration {
        Duration::from_millis(self.submit_grace_ms)
    }
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            workers: default_pool_workers(),
            queue_capacity: default_pool_queue_capacity(),
            task_timeout_ms: default_task_timeout_ms(),
            submit_grace_ms: default_submit_grace_ms(),
        }
    }
}

/// Where the request log is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLogStoreKind {
    /// Emit records as structured tracing events
    #[default]
    Tracing,
    /// Append JSON lines to `path`
    JsonLines,
}

/// Write-behind request log settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestLogSettings {
    /// Worker count (default 5)
    #[serde(default = "default_log_workers")]
    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    /// Record queue capacity (default 10000)
    #[serde(default = "default_log_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Grace period of `log` (default 1000)
    #[serde(default = "default_log_grace_ms")]
    #[validate(range(min = 1))]
    pub log_grace_ms: u64,

    /// Persistence attempts per record (default 3)
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    /// Linear backoff base between persistence attempts (default 1000)
    #[serde(default = "default_log_backoff_base_ms")]
    #[validate(range(min = 1))]
    pub backoff_base_ms: u64,

    #[serde(default)]
    pub store: RequestLogStoreKind,

    /// Output file for the `json_lines` store
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RequestLogSettings {
    pub fn log_grace(&self) -> Duration {
        Duration::from_millis(self.log_grace_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for RequestLogSettings {
    fn default() -> Self {
        Self {
            workers: default_log_workers(),
            queue_capacity: default_log_queue_capacity(),
            log_grace_ms: default_log_grace_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_log_backoff_base_ms(),
            store: RequestLogStoreKind::default(),
            path: None,
        }
    }
}

fn default_dispatch_timeout_ms() -> u64 {
    10_000
}

fn default_retry_base_interval_ms() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_pool_workers() -> usize {
    10
}

fn default_pool_queue_capacity() -> usize {
    1000
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_submit_grace_ms() -> u64 {
    100
}

fn default_log_workers() -> usize {
    5
}

fn default_log_queue_capacity() -> usize {
    10_000
}

fn default_log_grace_ms() -> u64 {
    1000
}

fn default_log_backoff_base_ms() -> u64 {
    1000
}
