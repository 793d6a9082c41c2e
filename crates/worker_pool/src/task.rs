//! Unit of work and its execution context

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type TaskFn = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Opaque unit of work
///
/// Submitted once and executed at most once by exactly one worker; a task
/// that is never dequeued (force-stopped pool) is dropped unexecuted.
pub struct Task {
    label: Option<String>,
    run: TaskFn,
}

impl Task {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: None,
            run: Box::new(move |ctx| f(ctx).boxed()),
        }
    }

    /// Attach a diagnostic label, reported in logs
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Run to completion, converting a panic into [`TaskOutcome::Panicked`]
    pub(crate) async fn execute(self, ctx: TaskContext) -> TaskOutcome {
        let run = self.run;
        let work = async move { run(ctx).await };

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(error)) => TaskOutcome::Failed(error),
            Err(panic) => TaskOutcome::Panicked(panic_message(panic.as_ref())),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish_non_exhaustive()
    }
}

/// How a task ended
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Completed,
    Failed(anyhow::Error),
    Panicked(String),
}

impl TaskOutcome {
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Deadline-bound context handed to a running task
///
/// Derived from the pool lifetime: a forced shutdown cancels it. The deadline
/// is advisory, the task decides when to stop.
#[derive(Debug, Clone)]
pub struct TaskContext {
    token: CancellationToken,
    deadline: Instant,
}

impl TaskContext {
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Detached context, used to run a task outside a pool
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once the pool force-stopped or the deadline passed
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Resolves on forced stop or deadline
    pub async fn done(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_execute_completed() {
        let task = Task::new(|_ctx| async { Ok(()) }).with_label("noop");
        assert_eq!(task.label(), Some("noop"));

        let outcome = task.execute(TaskContext::with_timeout(Duration::from_secs(1))).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_execute_failed() {
        let task = Task::new(|_ctx| async { Err(anyhow!("upstream unavailable")) });
        let outcome = task.execute(TaskContext::with_timeout(Duration::from_secs(1))).await;

        match outcome {
            TaskOutcome::Failed(e) => assert_eq!(e.to_string(), "upstream unavailable"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_catches_panic() {
        let task = Task::new(|_ctx| async {
            if true {
                panic!("worker bug");
            }
            Ok(())
        });
        let outcome = task.execute(TaskContext::with_timeout(Duration::from_secs(1))).await;

        match outcome {
            TaskOutcome::Panicked(message) => assert_eq!(message, "worker bug"),
            other => panic!("expected panic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_context_deadline() {
        let ctx = TaskContext::with_timeout(Duration::from_millis(10));
        assert!(!ctx.is_done());
        ctx.done().await;
        assert!(ctx.is_done());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
