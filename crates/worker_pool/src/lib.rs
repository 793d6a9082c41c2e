//! # Worker Pool
//!
//! Bounded queue, long-lived workers, drain-then-force-stop shutdown.
//!
//! ```text
//! submit ──▶ [bounded queue] ──▶ worker 0..n ──▶ Task(ctx) ──▶ stats
//!                  ▲                    │
//!             close on shutdown    lifetime token
//! ```
//!
//! The [`lifecycle`] helpers are shared with the write-behind logger.

mod error;
pub mod lifecycle;
mod pool;
mod stats;
mod task;

pub use error::{PoolError, Result};
pub use lifecycle::{ShutdownOutcome, WorkerState};
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use stats::{PoolStats, UNHEALTHY_OCCUPANCY};
pub use task::{Task, TaskContext};
