//! # Write-Behind
//!
//! Bounded write-behind logger for request log records.
//!
//! Callers hand records over and move on; workers persist them through a
//! [`contracts::LogStore`] with bounded linear-backoff retries. A record that
//! cannot be queued or persisted is dropped and reported to the operator.
//!
//! ## Stores
//! - [`TracingStore`]: structured `tracing` events
//! - [`JsonLinesStore`]: one JSON document per line in a file

mod logger;
pub mod stores;

pub use logger::{LoggerConfig, LoggerStats, WriteBehindLogger};
pub use stores::{JsonLinesStore, RequestLogStore, TracingStore};
pub use worker_pool::{ShutdownOutcome, WorkerState};

/// Logger over the store selected by configuration
pub type RequestLogger = WriteBehindLogger<RequestLogStore>;
