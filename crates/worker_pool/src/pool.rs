//! Bounded worker pool
//!
//! Long-lived workers pull [`Task`]s from one bounded queue. The queue is the
//! only backpressure mechanism; submitters learn about saturation through a
//! boolean, never a panic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_channel::{bounded, Receiver, Sender};
use contracts::WorkerPoolSettings;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::error::{PoolError, Result};
use crate::lifecycle::{self, ShutdownOutcome, WorkerState};
use crate::stats::{PoolStats, StatsCell};
use crate::task::{Task, TaskContext, TaskOutcome};

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Component name used in logs and metric labels
    pub name: String,
    /// Initial worker count
    pub workers: usize,
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// Advisory per-task deadline
    pub task_timeout: Duration,
    /// Grace period of [`WorkerPool::submit`]
    pub submit_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from(&WorkerPoolSettings::default())
    }
}

impl From<&WorkerPoolSettings> for WorkerPoolConfig {
    fn from(settings: &WorkerPoolSettings) -> Self {
        Self {
            name: "worker_pool".to_string(),
            workers: settings.workers,
            queue_capacity: settings.queue_capacity,
            task_timeout: settings.task_timeout(),
            submit_grace: settings.submit_grace(),
        }
    }
}

impl WorkerPoolConfig {
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

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_submit_grace(mut self, grace: Duration) -> Self {
        self.submit_grace = grace;
        self
    }

    /// Reject zero counts and a zero task timeout
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PoolError::invalid("workers", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::invalid("queue_capacity", "must be at least 1"));
        }
        if self.task_timeout.is_zero() {
            return Err(PoolError::invalid("task_timeout", "must be positive"));
        }
        Ok(())
    }
}

struct PoolInner {
    config: WorkerPoolConfig,
    tx: Sender<Task>,
    rx: Receiver<Task>,
    lifetime: CancellationToken,
    tracker: TaskTracker,
    stats: StatsCell,
    state: RwLock<WorkerState>,
    next_worker_id: AtomicUsize,
}

/// Bounded worker pool
///
/// Cheap to clone; clones share the queue and the workers. Must be created
/// inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let pool = WorkerPool::new(WorkerPoolConfig::new(4, 100))?;
///
/// let accepted = pool
///     .submit(Task::new(|ctx| async move {
///         refresh_balances(ctx).await
///     }))
///     .await;
///
/// pool.shutdown(Duration::from_secs(5)).await;
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers over a fresh queue
    ///
    /// # Errors
    /// `InvalidConfig` for a zero worker count, queue capacity or task timeout.
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = bounded(config.queue_capacity);
        let workers = config.workers;

        let pool = Self {
            inner: Arc::new(PoolInner {
                config,
                tx,
                rx,
                lifetime: CancellationToken::new(),
                tracker: TaskTracker::new(),
                stats: StatsCell::default(),
                state: RwLock::new(WorkerState::Starting),
                next_worker_id: AtomicUsize::new(0),
            }),
        };

        pool.grow(workers);
        pool.set_state(WorkerState::Running);
        info!(
            pool = %pool.inner.config.name,
            workers,
            queue_capacity = pool.inner.config.queue_capacity,
            "worker pool started"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    pub fn state(&self) -> WorkerState {
        *self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue with the configured grace period
    ///
    /// Returns false if the queue stayed full for the whole grace period or
    /// the pool is shutting down.
    pub async fn submit(&self, task: Task) -> bool {
        self.submit_with_timeout(task, self.inner.config.submit_grace)
            .await
    }

    /// Enqueue, waiting at most `grace` for queue space
    pub async fn submit_with_timeout(&self, task: Task, grace: Duration) -> bool {
        let label = task.label().map(str::to_string);

        match tokio::time::timeout(grace, self.inner.tx.send(task)).await {
            Ok(Ok(())) => {
                self.record_queue_depth();
                true
            }
            Ok(Err(_)) => {
                self.reject(label.as_deref(), "pool closed");
                false
            }
            Err(_) => {
                self.reject(label.as_deref(), "queue full");
                false
            }
        }
    }

    /// Enqueue, waiting as long as it takes for queue space
    ///
    /// # Errors
    /// `Closed` once shutdown has begun.
    pub async fn submit_blocking(&self, task: Task) -> Result<()> {
        let label = task.label().map(str::to_string);

        if self.inner.tx.send(task).await.is_err() {
            self.reject(label.as_deref(), "pool closed");
            return Err(PoolError::Closed);
        }
        self.record_queue_depth();
        Ok(())
    }

    /// Grow to `workers`; shrinking only updates the target
    ///
    /// Ignored once shutdown has begun.
    #[instrument(name = "worker_pool_resize", skip(self), fields(pool = %self.inner.config.name))]
    pub fn resize(&self, workers: usize) {
        if self.state() != WorkerState::Running {
            debug!(workers, "resize ignored, pool not running");
            return;
        }
        let spawned = self.grow(workers);
        info!(target_workers = workers, spawned, "worker pool resized");
    }

    /// Stop accepting tasks and drain up to `timeout`
    ///
    /// On timeout the lifetime token is cancelled, which every running task
    /// observes through its context, and queued tasks are discarded. Safe to
    /// call more than once.
    #[instrument(name = "worker_pool_shutdown", skip(self), fields(pool = %self.inner.config.name))]
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        if self.state() == WorkerState::Running {
            self.set_state(WorkerState::Draining);
            info!(queued = self.inner.tx.len(), "draining worker pool");
        }
        self.inner.tx.close();

        let outcome =
            lifecycle::drain(&self.inner.config.name, &self.inner.tracker, &self.inner.lifetime, timeout)
                .await;
        self.set_state(WorkerState::Stopped);
        outcome
    }

    /// Snapshot under a single lock read
    pub fn stats(&self) -> PoolStats {
        self.inner
            .stats
            .snapshot(self.inner.tx.len(), self.inner.config.queue_capacity)
    }

    /// False above 90% queue occupancy or without a live worker
    pub fn is_healthy(&self) -> bool {
        self.stats().is_healthy()
    }

    fn set_state(&self, state: WorkerState) {
        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn grow(&self, target: usize) -> usize {
        let spawn = self.inner.stats.resize(target);
        for _ in 0..spawn {
            let worker_id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
            let inner = Arc::clone(&self.inner);
            let span = tracing::debug_span!("worker", pool = %inner.config.name, worker_id);
            self.inner
                .tracker
                .spawn(run_worker(inner, worker_id).instrument(span));
        }
        spawn
    }

    fn reject(&self, label: Option<&str>, reason: &str) {
        self.inner.stats.task_rejected();
        observability::record_task_rejected(&self.inner.config.name);
        warn!(
            pool = %self.inner.config.name,
            task = label.unwrap_or("-"),
            reason,
            "task rejected"
        );
    }

    fn record_queue_depth(&self) {
        observability::record_queue_depth(
            &self.inner.config.name,
            self.inner.tx.len(),
            self.inner.config.queue_capacity,
        );
    }
}

async fn run_worker(inner: Arc<PoolInner>, worker_id: usize) {
    let active = inner.stats.worker_started();
    observability::record_active_workers(&inner.config.name, active);
    debug!("worker started");

    loop {
        let task = tokio::select! {
            biased;
            _ = inner.lifetime.cancelled() => break,
            task = inner.rx.recv() => match task {
                Ok(task) => task,
                Err(_) => break,
            },
        };
        execute(&inner, worker_id, task).await;
    }

    let active = inner.stats.worker_stopped();
    observability::record_active_workers(&inner.config.name, active);
    debug!("worker stopped");
}

async fn execute(inner: &PoolInner, worker_id: usize, task: Task) {
    let label = task.label().unwrap_or("-").to_string();
    let ctx = TaskContext::new(
        inner.lifetime.child_token(),
        Instant::now() + inner.config.task_timeout,
    );
    let past_deadline = ctx.clone();

    let outcome = task.execute(ctx).await;
    inner.stats.task_finished(outcome.is_success());

    let name = &inner.config.name;
    match outcome {
        TaskOutcome::Completed => {
            observability::record_task_finished(name, "completed");
            debug!(worker_id, task = %label, "task completed");
        }
        TaskOutcome::Failed(e) => {
            let kind = if past_deadline.is_done() { "timed_out" } else { "failed" };
            observability::record_task_finished(name, kind);
            warn!(worker_id, task = %label, error = %e, kind, "task failed");
        }
        TaskOutcome::Panicked(message) => {
            observability::record_task_finished(name, "panicked");
            error!(worker_id, task = %label, panic = %message, "task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn pool(workers: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(
            WorkerPoolConfig::new(workers, capacity).with_submit_grace(Duration::from_millis(30)),
        )
        .unwrap()
    }

    fn sleeper(ms: u64, done: &Arc<AtomicU64>) -> Task {
        let done = Arc::clone(done);
        Task::new(move |_ctx| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn blocker(release: &CancellationToken) -> Task {
        let release = release.clone();
        Task::new(move |_ctx| async move {
            release.cancelled().await;
            Ok(())
        })
    }

    async fn wait_for(pool: &WorkerPool, check: impl Fn(&PoolStats) -> bool) {
        for _ in 0..200 {
            if check(&pool.stats()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached: {:?}", pool.stats());
    }

    #[test]
    fn test_default_config() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.submit_grace, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let err = WorkerPool::new(WorkerPoolConfig::new(0, 10)).err();
        assert!(matches!(err, Some(PoolError::InvalidConfig { field: "workers", .. })));

        let err = WorkerPool::new(WorkerPoolConfig::new(2, 0)).err();
        assert!(matches!(err, Some(PoolError::InvalidConfig { field: "queue_capacity", .. })));
    }

    #[tokio::test]
    async fn test_executes_submitted_tasks() {
        let pool = pool(2, 10);
        let done = Arc::new(AtomicU64::new(0));

        for _ in 0..4 {
            assert!(pool.submit(sleeper(5, &done)).await);
        }
        assert!(pool.shutdown(Duration::from_secs(1)).await.is_completed());

        assert_eq!(done.load(Ordering::SeqCst), 4);
        let stats = pool.stats();
        assert_eq!(stats.tasks_completed, 4);
        assert_eq!(stats.tasks_failed, 0);
        assert_eq!(stats.active_workers, 0);
        assert_eq!(pool.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_failed_and_panicked_tasks_counted() {
        let pool = pool(1, 10);
        assert!(pool.submit(Task::new(|_ctx| async { anyhow::bail!("rpc 503") })).await);
        assert!(
            pool.submit(
                Task::new(|_ctx| async {
                    if true {
                        panic!("bad task");
                    }
                    Ok(())
                })
                .with_label("panicky")
            )
            .await
        );
        assert!(pool.submit(Task::new(|_ctx| async { Ok(()) })).await);

        pool.shutdown(Duration::from_secs(1)).await;

        let stats = pool.stats();
        assert_eq!(stats.tasks_failed, 2);
        assert_eq!(stats.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_submit_full_queue_returns_false_within_grace() {
        let pool = pool(1, 1);
        let release = CancellationToken::new();

        assert!(pool.submit(blocker(&release)).await);
        wait_for(&pool, |s| s.queue_length == 0).await;
        assert!(pool.submit(blocker(&release)).await);

        let start = Instant::now();
        let accepted = pool
            .submit_with_timeout(blocker(&release), Duration::from_millis(50))
            .await;
        let waited = start.elapsed();

        assert!(!accepted);
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(500));

        let stats = pool.stats();
        assert_eq!(stats.tasks_rejected, 1);
        assert!(stats.queue_length <= stats.queue_capacity);

        release.cancel();
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_health_tracks_occupancy() {
        let pool = pool(1, 10);
        let release = CancellationToken::new();

        assert!(pool.submit(blocker(&release)).await);
        wait_for(&pool, |s| s.queue_length == 0).await;

        for _ in 0..9 {
            assert!(pool.submit(blocker(&release)).await);
        }
        assert_eq!(pool.stats().queue_length, 9);
        assert!(pool.is_healthy());

        assert!(pool.submit(blocker(&release)).await);
        assert_eq!(pool.stats().queue_length, 10);
        assert!(!pool.is_healthy());

        release.cancel();
        pool.shutdown(Duration::from_secs(1)).await;
        assert!(!pool.is_healthy());
    }

    #[tokio::test]
    async fn test_submit_blocking_waits_for_space() {
        let pool = pool(2, 1);
        let done = Arc::new(AtomicU64::new(0));

        let start = Instant::now();
        for _ in 0..5 {
            pool.submit_blocking(sleeper(100, &done)).await.unwrap();
        }
        pool.shutdown(Duration::from_secs(2)).await;
        let elapsed = start.elapsed();

        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let pool = pool(1, 20);
        let done = Arc::new(AtomicU64::new(0));

        for _ in 0..10 {
            assert!(pool.submit(sleeper(2, &done)).await);
        }
        let outcome = pool.shutdown(Duration::from_secs(2)).await;

        assert_eq!(outcome, ShutdownOutcome::Completed);
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_force_stops() {
        let pool = pool(1, 10);
        let observed = Arc::new(AtomicU64::new(0));

        let flag = Arc::clone(&observed);
        let task = Task::new(move |ctx| async move {
            ctx.token().cancelled().await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(pool.submit(task).await);
        let done = Arc::new(AtomicU64::new(0));
        assert!(pool.submit(sleeper(1, &done)).await);

        let outcome = pool.shutdown(Duration::from_millis(50)).await;
        assert_eq!(outcome, ShutdownOutcome::ForceStopped);

        // Second call is safe and sees the cancelled worker exit.
        let again = pool.shutdown(Duration::from_secs(1)).await;
        assert!(again.is_completed());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let pool = pool(1, 4);
        pool.shutdown(Duration::from_secs(1)).await;

        assert!(!pool.submit(Task::new(|_ctx| async { Ok(()) })).await);
        let err = pool
            .submit_blocking(Task::new(|_ctx| async { Ok(()) }))
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::Closed);
        assert_eq!(pool.stats().tasks_rejected, 2);
    }

    #[tokio::test]
    async fn test_task_context_deadline() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new(1, 4).with_task_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        let hit = Arc::new(AtomicU64::new(0));

        let flag = Arc::clone(&hit);
        let task = Task::new(move |ctx| async move {
            ctx.done().await;
            flag.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("deadline reached")
        });
        assert!(pool.submit(task).await);

        pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(hit.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_resize_grows_only() {
        let pool = pool(2, 10);
        wait_for(&pool, |s| s.active_workers == 2).await;

        pool.resize(4);
        wait_for(&pool, |s| s.active_workers == 4).await;

        pool.resize(1);
        let stats = pool.stats();
        assert_eq!(stats.total_workers, 4);
        assert_eq!(stats.target_workers, 1);
        assert_eq!(stats.active_workers, 4);
        assert!(stats.active_workers <= stats.total_workers);

        pool.shutdown(Duration::from_secs(1)).await;
        pool.resize(8);
        assert_eq!(pool.stats().total_workers, 4);
    }
}
