//! 尝试的 fan-out 与结果收集
//!
//! 每个尝试一个任务，全部上报到同一个有界 channel；容量等于尝试数，迟到的上报不会阻塞。

use std::sync::Arc;

use contracts::{CallContext, CallError, CallResult, EndpointCall, RemoteCall};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, Instrument};

use crate::error::EndpointFailure;

struct Attempt {
    index: usize,
    result: CallResult,
}

/// Next thing the aggregator observes
pub(crate) enum Event {
    /// One attempt finished
    Reported(CallResult),
    /// Every attempt task has ended
    Exhausted,
    /// Deadline or cancellation fired first
    Interrupted(CallError),
}

pub(crate) struct Collector {
    calls: Vec<EndpointCall>,
    reported: Vec<bool>,
    rx: mpsc::Receiver<Attempt>,
    ctx: CallContext,
}

impl Collector {
    /// Spawn one attempt per call, all sharing `ctx`
    pub(crate) fn spawn<C>(caller: &Arc<C>, calls: Vec<EndpointCall>, ctx: CallContext) -> Self
    where
        C: RemoteCall + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(calls.len().max(1));

        for (index, call) in calls.iter().enumerate() {
            let caller = Arc::clone(caller);
            let call = call.clone();
            let attempt_ctx = ctx.clone();
            let tx = tx.clone();
            let span = tracing::debug_span!("dispatch_attempt", endpoint = %call.endpoint, method = %call.method);

            tokio::spawn(
                async move {
                    let start = Instant::now();
                    let outcome = caller.call(&call, &attempt_ctx).await;
                    let result = CallResult::from_outcome(&call, outcome, start.elapsed());
                    observability::record_attempt(&result.endpoint, result.is_success(), result.elapsed);
                    // 接收端已关闭说明聚合器已返回，结果直接丢弃
                    if tx.try_send(Attempt { index, result }).is_err() {
                        debug!("attempt finished after dispatch resolved, result discarded");
                    }
                }
                .instrument(span),
            );
        }

        Self {
            reported: vec![false; calls.len()],
            calls,
            rx,
            ctx,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    pub(crate) async fn next(&mut self) -> Event {
        tokio::select! {
            biased;
            attempt = self.rx.recv() => match attempt {
                Some(Attempt { index, result }) => {
                    self.reported[index] = true;
                    Event::Reported(result)
                }
                None => Event::Exhausted,
            },
            reason = self.ctx.done() => Event::Interrupted(reason),
        }
    }

    /// Why the shared context is done, if it is
    ///
    /// Attempts that observe the context report its reason as their own
    /// error, usually before the collector's own wake-up fires.
    pub(crate) fn interruption(&self) -> Option<CallError> {
        self.ctx.interruption()
    }

    /// Failures for attempts that never reported, tagged with `reason`
    pub(crate) fn unreported(&self, reason: &CallError) -> Vec<EndpointFailure> {
        self.calls
            .iter()
            .zip(&self.reported)
            .filter(|(_, reported)| !**reported)
            .map(|(call, _)| EndpointFailure::new(&call.endpoint, reason.clone()))
            .collect()
    }
}
