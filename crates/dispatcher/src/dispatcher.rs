//! Dispatcher - fan-out of one request to many endpoints
//!
//! Every operation derives one deadline-bound child token from the caller's
//! parent token, hands it to every attempt and cancels it on return.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    Backoff, CallContext, CallError, CallResult, CancellationToken, DispatcherSettings,
    EndpointCall, MethodCall, RemoteCall,
};
use tokio::time::Instant;
use tokio_util::sync::DropGuard;
use tracing::{debug, info, instrument, warn};

use crate::collector::{Collector, Event};
use crate::error::{DispatchError, EndpointFailure};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Default per-operation deadline
    pub timeout: Duration,
    /// Base interval of the linear retry backoff
    pub retry_base_interval: Duration,
}

impl DispatcherConfig {
    /// Config with the given timeout and the default retry base interval
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_retry_base_interval(mut self, base: Duration) -> Self {
        self.retry_base_interval = base;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&DispatcherSettings::default())
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            retry_base_interval: settings.retry_base_interval(),
        }
    }
}

/// Fan-out dispatcher over an injected [`RemoteCall`]
///
/// Cheap to clone; clones share the caller and the metrics.
pub struct Dispatcher<C> {
    caller: Arc<C>,
    config: DispatcherConfig,
    metrics: Arc<DispatchMetrics>,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            caller: Arc::clone(&self.caller),
            config: self.config,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<C> Dispatcher<C>
where
    C: RemoteCall + Sync + 'static,
{
    /// Create a dispatcher with the given default timeout
    pub fn new(caller: C, timeout: Duration) -> Self {
        Self::with_config(Arc::new(caller), DispatcherConfig::new(timeout))
    }

    pub fn with_config(caller: Arc<C>, config: DispatcherConfig) -> Self {
        Self {
            caller,
            config,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Operations bound to a caller-supplied parent token
    ///
    /// Cancelling `parent` cancels every attempt of operations issued
    /// through the returned scope.
    pub fn scope(&self, parent: &CancellationToken) -> DispatchScope<'_, C> {
        DispatchScope {
            dispatcher: self,
            parent: parent.clone(),
            timeout: self.config.timeout,
        }
    }

    fn root(&self) -> DispatchScope<'_, C> {
        self.scope(&CancellationToken::new())
    }

    /// First attempt to succeed wins; see [`DispatchScope::request_with_failover`]
    pub async fn request_with_failover<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<CallResult, DispatchError> {
        self.root()
            .request_with_failover(endpoints, method, params)
            .await
    }

    /// Every result collected before the deadline; see [`DispatchScope::request_all`]
    pub async fn request_all<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<Vec<CallResult>, DispatchError> {
        self.root().request_all(endpoints, method, params).await
    }

    /// Fastest success, genuine failures only; see [`DispatchScope::request_fastest`]
    pub async fn request_fastest<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<CallResult, DispatchError> {
        self.root().request_fastest(endpoints, method, params).await
    }

    /// Sequential retry; see [`DispatchScope::request_with_retry`]
    pub async fn request_with_retry(
        &self,
        endpoint: &str,
        method: &str,
        params: Bytes,
        max_attempts: u32,
    ) -> Result<CallResult, DispatchError> {
        self.root()
            .request_with_retry(endpoint, method, params, max_attempts)
            .await
    }

    /// Concurrent batch against one endpoint; see [`DispatchScope::batch_request`]
    pub async fn batch_request(
        &self,
        endpoint: &str,
        requests: &[MethodCall],
    ) -> Result<Vec<CallResult>, DispatchError> {
        self.root().batch_request(endpoint, requests).await
    }
}

/// Dispatch operations bound to a parent token and a timeout
pub struct DispatchScope<'a, C> {
    dispatcher: &'a Dispatcher<C>,
    parent: CancellationToken,
    timeout: Duration,
}

impl<C> DispatchScope<'_, C>
where
    C: RemoteCall + Sync + 'static,
{
    /// Override the dispatcher's default timeout for this scope
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issue `method` to every endpoint concurrently, return the first success
    ///
    /// "First" is completion order, not list order. Remaining attempts are
    /// cancelled as soon as one succeeds. Without a success the error lists one
    /// cause per endpoint; endpoints that never reported are tagged with the
    /// deadline or cancellation that cut them off.
    ///
    /// # Errors
    /// `NoEndpoints`, `AllFailed`, `TimedOut` or `Cancelled`.
    #[instrument(
        name = "dispatch_failover",
        skip_all,
        fields(endpoints = endpoints.len(), method = %method)
    )]
    pub async fn request_with_failover<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<CallResult, DispatchError> {
        let calls = endpoint_calls(endpoints, method, &params);
        if calls.is_empty() {
            return Err(DispatchError::NoEndpoints);
        }
        self.race("failover", calls, true).await
    }

    /// Issue `method` to every endpoint, wait for all of them or the deadline
    ///
    /// Results come back in arrival order with per-endpoint errors inside them;
    /// on deadline the results collected so far are returned.
    ///
    /// # Errors
    /// `NoEndpoints` only.
    #[instrument(
        name = "dispatch_all",
        skip_all,
        fields(endpoints = endpoints.len(), method = %method)
    )]
    pub async fn request_all<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<Vec<CallResult>, DispatchError> {
        let calls = endpoint_calls(endpoints, method, &params);
        if calls.is_empty() {
            return Err(DispatchError::NoEndpoints);
        }
        Ok(self.gather("all", calls).await)
    }

    /// Like failover, but a failed race reports only attempts that genuinely
    /// failed, plus whether the deadline cut the race short
    ///
    /// # Errors
    /// `NoEndpoints`, `AllFailed`, `TimedOut` or `Cancelled`.
    #[instrument(
        name = "dispatch_fastest",
        skip_all,
        fields(endpoints = endpoints.len(), method = %method)
    )]
    pub async fn request_fastest<E: AsRef<str>>(
        &self,
        endpoints: &[E],
        method: &str,
        params: Bytes,
    ) -> Result<CallResult, DispatchError> {
        let calls = endpoint_calls(endpoints, method, &params);
        if calls.is_empty() {
            return Err(DispatchError::NoEndpoints);
        }
        self.race("fastest", calls, false).await
    }

    /// Call one endpoint up to `max_attempts` times
    ///
    /// The wait after attempt `n` is `n × retry_base_interval`. Cancellation
    /// and deadline are checked before each attempt and before each sleep and
    /// are never retried; a call that itself reports cancellation ends the loop.
    /// The scope deadline covers all attempts and backoff sleeps together.
    ///
    /// # Errors
    /// `NoAttempts` for a zero bound, `RetriesExhausted` with the last cause,
    /// or `TimedOut` / `Cancelled`.
    #[instrument(name = "dispatch_retry", skip(self, params))]
    pub async fn request_with_retry(
        &self,
        endpoint: &str,
        method: &str,
        params: Bytes,
        max_attempts: u32,
    ) -> Result<CallResult, DispatchError> {
        if max_attempts == 0 {
            return Err(DispatchError::NoAttempts);
        }
        let call = EndpointCall::new(endpoint, method, params);
        let backoff = Backoff::linear(self.dispatcher.config.retry_base_interval);
        let (ctx, _guard) = self.open();
        let metrics = &self.dispatcher.metrics;
        metrics.inc_operations();

        let mut failures = Vec::new();
        let mut attempt = 0;
        loop {
            if let Some(reason) = ctx.interruption() {
                return Err(self.interrupted("retry", &reason, failures));
            }
            attempt += 1;

            metrics.add_attempts(1);
            let start = Instant::now();
            let outcome = tokio::select! {
                outcome = self.dispatcher.caller.call(&call, &ctx) => outcome,
                reason = ctx.done() => Err(reason),
            };
            let result = CallResult::from_outcome(&call, outcome, start.elapsed());
            observability::record_attempt(&result.endpoint, result.is_success(), result.elapsed);

            let Some(error) = result.error.clone() else {
                return Ok(self.succeeded("retry", result));
            };
            metrics.inc_attempt_failures();
            debug!(endpoint = %endpoint, attempt, max_attempts, error = %error, "attempt failed");

            if let Some(reason) = ctx.interruption() {
                failures.push(EndpointFailure::new(endpoint, error));
                return Err(self.interrupted("retry", &reason, failures));
            }
            if error.is_cancellation() || attempt >= max_attempts {
                return Err(self.failed(
                    "retry",
                    DispatchError::RetriesExhausted {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        source: error,
                    },
                ));
            }
            failures.push(EndpointFailure::new(endpoint, error));

            tokio::select! {
                _ = tokio::time::sleep(backoff.delay(attempt)) => {}
                reason = ctx.done() => return Err(self.interrupted("retry", &reason, failures)),
            }
        }
    }

    /// Issue several methods to one endpoint concurrently
    ///
    /// Results arrive in completion order, not submission order.
    ///
    /// # Errors
    /// `NoRequests` only.
    #[instrument(
        name = "dispatch_batch",
        skip(self, requests),
        fields(requests = requests.len())
    )]
    pub async fn batch_request(
        &self,
        endpoint: &str,
        requests: &[MethodCall],
    ) -> Result<Vec<CallResult>, DispatchError> {
        if requests.is_empty() {
            return Err(DispatchError::NoRequests);
        }
        let calls = requests.iter().map(|r| r.to_endpoint(endpoint)).collect();
        Ok(self.gather("batch", calls).await)
    }

    fn open(&self) -> (CallContext, DropGuard) {
        let token = self.parent.child_token();
        let ctx = CallContext::new(token.clone(), Instant::now() + self.timeout);
        (ctx, token.drop_guard())
    }

    fn fan_out(&self, calls: Vec<EndpointCall>, ctx: CallContext) -> Collector {
        let metrics = &self.dispatcher.metrics;
        metrics.inc_operations();
        metrics.add_attempts(calls.len() as u64);
        Collector::spawn(&self.dispatcher.caller, calls, ctx)
    }

    /// First success wins; `pad_unreported` tags silent endpoints on interruption
    ///
    /// Without padding, attempts that only echoed the interruption are left
    /// out of the failure list.
    async fn race(
        &self,
        operation: &'static str,
        calls: Vec<EndpointCall>,
        pad_unreported: bool,
    ) -> Result<CallResult, DispatchError> {
        let (ctx, _guard) = self.open();
        let mut collector = self.fan_out(calls, ctx);
        let mut failures = Vec::with_capacity(collector.len());

        let reason = loop {
            match collector.next().await {
                Event::Reported(result) if result.is_success() => {
                    return Ok(self.succeeded(operation, result));
                }
                Event::Reported(result) => {
                    let echoed = result.error.as_ref().is_some_and(CallError::is_cancellation);
                    let failure = self.attempt_failed(result);
                    if pad_unreported || !echoed {
                        failures.push(failure);
                    }
                    if let Some(reason) = collector.interruption() {
                        break reason;
                    }
                }
                Event::Exhausted => match collector.interruption() {
                    Some(reason) => break reason,
                    None => {
                        failures.extend(collector.unreported(&CallError::Abandoned));
                        return Err(self.failed(operation, DispatchError::AllFailed { failures }));
                    }
                },
                Event::Interrupted(reason) => break reason,
            }
        };

        if pad_unreported {
            failures.extend(collector.unreported(&reason));
        }
        Err(self.interrupted(operation, &reason, failures))
    }

    /// Collect every result until all attempts end or the deadline fires
    async fn gather(&self, operation: &'static str, calls: Vec<EndpointCall>) -> Vec<CallResult> {
        let (ctx, _guard) = self.open();
        let mut collector = self.fan_out(calls, ctx);
        let mut results: Vec<CallResult> = Vec::with_capacity(collector.len());

        let interruption = loop {
            match collector.next().await {
                Event::Reported(result) => {
                    if !result.is_success() {
                        self.dispatcher.metrics.inc_attempt_failures();
                    }
                    results.push(result);
                }
                Event::Exhausted => break collector.interruption(),
                Event::Interrupted(reason) => break Some(reason),
            }
        };

        let metrics = &self.dispatcher.metrics;
        match interruption {
            Some(reason) => {
                info!(
                    operation,
                    collected = results.len(),
                    expected = collector.len(),
                    reason = %reason,
                    "returning partial results"
                );
                metrics.inc_interrupted();
                observability::record_dispatch(operation, outcome_label(&reason));
            }
            None if results.iter().any(CallResult::is_success) => {
                metrics.inc_succeeded();
                observability::record_dispatch(operation, "success");
            }
            None => {
                metrics.inc_failed();
                observability::record_dispatch(operation, "failure");
                warn!(operation, collected = results.len(), "every attempt failed");
            }
        }
        results
    }

    fn attempt_failed(&self, result: CallResult) -> EndpointFailure {
        self.dispatcher.metrics.inc_attempt_failures();
        let error = result.error.unwrap_or(CallError::Abandoned);
        debug!(endpoint = %result.endpoint, error = %error, "attempt failed");
        EndpointFailure::new(result.endpoint, error)
    }

    fn succeeded(&self, operation: &'static str, result: CallResult) -> CallResult {
        self.dispatcher.metrics.inc_succeeded();
        observability::record_dispatch(operation, "success");
        debug!(operation, endpoint = %result.endpoint, elapsed_ms = result.elapsed.as_millis() as u64, "dispatch succeeded");
        result
    }

    fn failed(&self, operation: &'static str, error: DispatchError) -> DispatchError {
        self.dispatcher.metrics.inc_failed();
        observability::record_dispatch(operation, "failure");
        warn!(operation, error = %error, "dispatch failed");
        error
    }

    fn interrupted(
        &self,
        operation: &'static str,
        reason: &CallError,
        failures: Vec<EndpointFailure>,
    ) -> DispatchError {
        self.dispatcher.metrics.inc_interrupted();
        observability::record_dispatch(operation, outcome_label(reason));
        let error = DispatchError::interrupted(reason, self.timeout, failures);
        warn!(operation, error = %error, "dispatch interrupted");
        error
    }
}

fn endpoint_calls<E: AsRef<str>>(endpoints: &[E], method: &str, params: &Bytes) -> Vec<EndpointCall> {
    endpoints
        .iter()
        .map(|e| EndpointCall::new(e.as_ref(), method, params.clone()))
        .collect()
}

fn outcome_label(reason: &CallError) -> &'static str {
    match reason {
        CallError::DeadlineExceeded => "timeout",
        _ => "cancelled",
    }
}
