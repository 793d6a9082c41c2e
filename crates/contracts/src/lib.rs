//! # Contracts
//!
//! Frozen interface contracts shared by the dispatch core crates.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Injection points
//! - [`RemoteCall`]: one network request against one endpoint
//! - [`LogStore`]: durable write of one log record
//!
//! Unit-of-work tasks are owned by the `worker_pool` crate.

mod backoff;
mod call;
mod config;
mod error;
mod node;
mod remote;
mod request_log;
mod store;

pub use backoff::Backoff;
pub use call::*;
pub use config::*;
pub use error::*;
pub use node::{order_endpoints, ChainType, NodeDescriptor};
pub use remote::{FnRemoteCall, LocalRemoteCall, RemoteCall};
pub use request_log::RequestLog;
pub use store::{LocalLogStore, LogStore};

/// Cancellation token shared by every attempt of one dispatch
pub use tokio_util::sync::CancellationToken;
