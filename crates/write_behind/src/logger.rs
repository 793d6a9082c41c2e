//! Write-behind logger
//!
//! Fixed set of workers persisting records from a bounded queue. Delivery is
//! best effort: a record is either persisted once or dropped and reported to
//! the operator, never surfaced to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_channel::{bounded, Receiver, Sender};
use contracts::{Backoff, LogStore, RequestLogSettings};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn, Instrument};
use worker_pool::lifecycle::{self, ShutdownOutcome, WorkerState};
use worker_pool::PoolError;

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Component name used in logs and metric labels
    pub name: String,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Grace period of [`WriteBehindLogger::log`]
    pub log_grace: Duration,
    /// Persist attempts per record, including the first
    pub max_attempts: u32,
    /// Wait after attempt `n` is `n × backoff_base`
    pub backoff_base: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::from(&RequestLogSettings::default())
    }
}

impl From<&RequestLogSettings> for LoggerConfig {
    fn from(settings: &RequestLogSettings) -> Self {
        Self {
            name: "request_log".to_string(),
            workers: settings.workers,
            queue_capacity: settings.queue_capacity,
            log_grace: settings.log_grace(),
            max_attempts: settings.max_attempts,
            backoff_base: settings.backoff_base(),
        }
    }
}

impl LoggerConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_log_grace(mut self, grace: Duration) -> Self {
        self.log_grace = grace;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.backoff_base = backoff_base;
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        let invalid = |field, message: &str| PoolError::InvalidConfig {
            field,
            message: message.to_string(),
        };
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

/// Logger statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub worker_count: usize,
    /// Records written by the store
    pub persisted: u64,
    /// Records refused because the queue stayed full
    pub dropped_queue_full: u64,
    /// Records refused after shutdown closed the queue
    pub dropped_closed: u64,
    /// Records dropped after the last persist attempt failed
    pub dropped_exhausted: u64,
}

#[derive(Debug, Default)]
struct LoggerCounters {
    persisted: AtomicU64,
    dropped_queue_full: AtomicU64,
    dropped_closed: AtomicU64,
    dropped_exhausted: AtomicU64,
}

struct LoggerInner<S: LogStore> {
    config: LoggerConfig,
    store: S,
    tx: Sender<S::Record>,
    rx: Receiver<S::Record>,
    lifetime: CancellationToken,
    tracker: TaskTracker,
    counters: LoggerCounters,
    state: RwLock<WorkerState>,
}

/// Bounded write-behind logger over a [`LogStore`]
///
/// Cheap to clone. Must be created inside a tokio runtime.
pub struct WriteBehindLogger<S: LogStore> {
    inner: Arc<LoggerInner<S>>,
}

impl<S: LogStore> Clone for WriteBehindLogger<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> WriteBehindLogger<S>
where
    S: LogStore + Sync + 'static,
{
    /// Spawn `config.workers` persist workers
    ///
    /// # Errors
    /// `InvalidConfig` for a zero worker count, queue capacity or attempt bound.
    pub fn new(store: S, config: LoggerConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let (tx, rx) = bounded(config.queue_capacity);

        let inner = Arc::new(LoggerInner {
            config,
            store,
            tx,
            rx,
            lifetime: CancellationToken::new(),
            tracker: TaskTracker::new(),
            counters: LoggerCounters::default(),
            state: RwLock::new(WorkerState::Starting),
        });

        for worker_id in 0..inner.config.workers {
            let worker = Arc::clone(&inner);
            let span = tracing::debug_span!("log_worker", logger = %inner.config.name, worker_id);
            inner.tracker.spawn(persist_worker(worker).instrument(span));
        }
        *inner.state.write().unwrap_or_else(PoisonError::into_inner) = WorkerState::Running;

        info!(
            logger = %inner.config.name,
            store = %inner.store.name(),
            workers = inner.config.workers,
            queue_capacity = inner.config.queue_capacity,
            "write-behind logger started"
        );
        Ok(Self { inner })
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> WorkerState {
        *self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue with the configured grace period
    ///
    /// A record still refused after the grace period is dropped and reported
    /// through logs and metrics only.
    pub async fn log(&self, record: S::Record) {
        self.log_with_timeout(record, self.inner.config.log_grace)
            .await;
    }

    /// Enqueue, waiting at most `timeout` for queue space
    pub async fn log_with_timeout(&self, record: S::Record, timeout: Duration) -> bool {
        let counters = &self.inner.counters;
        let (reason, counter) = match tokio::time::timeout(timeout, self.inner.tx.send(record)).await {
            Ok(Ok(())) => {
                observability::record_queue_depth(
                    &self.inner.config.name,
                    self.inner.tx.len(),
                    self.inner.config.queue_capacity,
                );
                return true;
            }
            Ok(Err(_)) => ("closed", &counters.dropped_closed),
            Err(_) => ("queue_full", &counters.dropped_queue_full),
        };

        counter.fetch_add(1, Ordering::Relaxed);
        observability::record_log_dropped(reason);
        warn!(
            logger = %self.inner.config.name,
            reason,
            timeout_ms = timeout.as_millis() as u64,
            "log record dropped"
        );
        false
    }

    /// Same contract as [`worker_pool::WorkerPool::shutdown`]
    #[instrument(name = "write_behind_shutdown", skip(self), fields(logger = %self.inner.config.name))]
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == WorkerState::Running {
                *state = WorkerState::Draining;
            }
        }
        info!(queued = self.inner.tx.len(), "draining write-behind logger");
        self.inner.tx.close();

        let outcome = lifecycle::drain(
            &self.inner.config.name,
            &self.inner.tracker,
            &self.inner.lifetime,
            timeout,
        )
        .await;
        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = WorkerState::Stopped;
        outcome
    }

    pub fn stats(&self) -> LoggerStats {
        let counters = &self.inner.counters;
        LoggerStats {
            queue_length: self.inner.tx.len(),
            queue_capacity: self.inner.config.queue_capacity,
            worker_count: self.inner.tracker.len(),
            persisted: counters.persisted.load(Ordering::Relaxed),
            dropped_queue_full: counters.dropped_queue_full.load(Ordering::Relaxed),
            dropped_closed: counters.dropped_closed.load(Ordering::Relaxed),
            dropped_exhausted: counters.dropped_exhausted.load(Ordering::Relaxed),
        }
    }
}

async fn persist_worker<S>(inner: Arc<LoggerInner<S>>)
where
    S: LogStore + Sync + 'static,
{
    debug!("log worker started");

    loop {
        let record = tokio::select! {
            biased;
            _ = inner.lifetime.cancelled() => break,
            record = inner.rx.recv() => match record {
                Ok(record) => record,
                Err(_) => break,
            },
        };
        persist_with_retry(&inner, &record).await;
    }

    debug!("log worker stopped");
}

/// Persist one record, retrying with linear backoff
async fn persist_with_retry<S>(inner: &LoggerInner<S>, record: &S::Record)
where
    S: LogStore + Sync + 'static,
{
    let config = &inner.config;
    let backoff = Backoff::linear(config.backoff_base);
    let store = inner.store.name();

    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match inner.store.persist(record).await {
            Ok(()) => {
                inner.counters.persisted.fetch_add(1, Ordering::Relaxed);
                observability::record_log_persisted(store, attempt);
                if attempt > 1 {
                    debug!(store, attempt, "log record persisted after retry");
                }
                return;
            }
            Err(e) => e,
        };

        if attempt >= config.max_attempts {
            inner
                .counters
                .dropped_exhausted
                .fetch_add(1, Ordering::Relaxed);
            observability::record_log_dropped("exhausted");
            error!(store, attempts = attempt, error = %error, "log record dropped after retries");
            return;
        }

        let delay = backoff.delay(attempt);
        warn!(
            store,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            error = %error,
            "persist failed, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = inner.lifetime.cancelled() => {
                inner
                    .counters
                    .dropped_exhausted
                    .fetch_add(1, Ordering::Relaxed);
                observability::record_log_dropped("closed");
                warn!(store, attempt, "forced stop during retry, log record dropped");
                return;
            }
        }
    }
}
