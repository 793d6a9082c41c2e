//! Process-wide dispatch core services
//!
//! The dispatcher, the worker pool and the request logger are started once
//! from configuration and handed to consumers as one bundle.

use std::sync::Arc;
use std::time::Duration;

use contracts::{CoreConfig, LogStore, RemoteCall};
use dispatcher::{Dispatcher, DispatcherConfig};
use tokio::time::Instant;
use tracing::{info, instrument};
use worker_pool::{ShutdownOutcome, WorkerPool, WorkerPoolConfig};
use write_behind::{LoggerConfig, WriteBehindLogger};

use crate::error::{CliError, Result};

/// Dispatcher, worker pool and request logger sharing one lifecycle
pub struct CoreServices<C, S: LogStore> {
    pub dispatcher: Dispatcher<C>,
    pub pool: WorkerPool,
    pub logger: WriteBehindLogger<S>,
}

/// Outcome of [`CoreServices::shutdown`], one entry per queue-backed service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicesShutdown {
    pub pool: ShutdownOutcome,
    pub logger: ShutdownOutcome,
}

impl ServicesShutdown {
    pub fn is_completed(&self) -> bool {
        self.pool.is_completed() && self.logger.is_completed()
    }
}

impl<C, S> CoreServices<C, S>
where
    C: RemoteCall + Sync + 'static,
    S: LogStore + Sync + 'static,
{
    /// Start every service from `config`
    ///
    /// Must be called inside a tokio runtime; workers are spawned here.
    ///
    /// # Errors
    /// `ServiceStart` when a pool or logger setting is out of range. Both
    /// settings are checked before any worker is spawned.
    pub fn init(config: &CoreConfig, caller: C, store: S) -> Result<Self> {
        let pool_config = WorkerPoolConfig::from(&config.worker_pool);
        pool_config
            .validate()
            .map_err(|e| CliError::service_start("worker_pool", e))?;

        let logger_config = LoggerConfig::from(&config.request_log);
        logger_config
            .validate()
            .map_err(|e| CliError::service_start("request_log", e))?;

        let dispatcher = Dispatcher::with_config(
            Arc::new(caller),
            DispatcherConfig::from(&config.dispatcher),
        );
        let pool = WorkerPool::new(pool_config)
            .map_err(|e| CliError::service_start("worker_pool", e))?;
        let logger = WriteBehindLogger::new(store, logger_config)
            .map_err(|e| CliError::service_start("request_log", e))?;

        info!(
            timeout_ms = config.dispatcher.timeout_ms,
            pool_workers = config.worker_pool.workers,
            log_workers = config.request_log.workers,
            "core services started"
        );

        Ok(Self {
            dispatcher,
            pool,
            logger,
        })
    }

    /// Stop the pool, then the logger, within one overall `timeout`
    ///
    /// Tasks still running in the pool may log; the logger gets whatever
    /// time the pool left over.
    #[instrument(name = "core_shutdown", skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> ServicesShutdown {
        let deadline = Instant::now() + timeout;

        let pool = self.pool.shutdown(timeout).await;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let logger = self.logger.shutdown(remaining).await;

        let outcome = ServicesShutdown { pool, logger };
        info!(pool = ?outcome.pool, logger = ?outcome.logger, "core services stopped");
        outcome
    }
}
