//! Simulation driver
//!
//! Each simulated request becomes one pool task: the task dispatches through
//! the configured mode, folds the attempts into a shared aggregator and hands
//! request log records to the write-behind logger.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use bytes::Bytes;
use contracts::{CallResult, LogStore, MethodCall, RequestLog};
use dispatcher::{DispatchError, Dispatcher};
use observability::DispatchAggregator;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use worker_pool::{Task, TaskContext};
use write_behind::WriteBehindLogger;

use super::node::SimulatedNodes;
use super::stats::SimulationStats;
use crate::error::{CliError, Result};
use crate::services::CoreServices;

const METHOD: &str = "eth_blockNumber";
const BATCH_METHOD: &str = "eth_getBlockByNumber";

/// Dispatch operation exercised by every simulated request
#[derive(clap::ValueEnum, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// First success across all endpoints
    #[default]
    Failover,
    /// Every result before the deadline
    All,
    /// Fastest success, genuine failures only
    Fastest,
    /// Sequential retry against one endpoint
    Retry,
    /// Concurrent batch against one endpoint
    Batch,
}

impl SimulationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::All => "all",
            Self::Fastest => "fastest",
            Self::Retry => "retry",
            Self::Batch => "batch",
        }
    }
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub mode: SimulationMode,
    /// Simulated client requests
    pub requests: usize,
    /// Attempt bound of [`SimulationMode::Retry`]
    pub max_attempts: u32,
    /// Requests per [`SimulationMode::Batch`] operation
    pub batch_size: usize,
    /// Chain name written into request log records
    pub chain: String,
    /// Overall budget of the final service shutdown
    pub shutdown_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            requests: 100,
            max_attempts: 3,
            batch_size: 4,
            chain: "ethereum".to_string(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    /// `InvalidSimulation` for a zero request count, attempt bound or batch size.
    pub fn validate(&self) -> Result<()> {
        if self.requests == 0 {
            return Err(CliError::invalid_simulation("requests", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(CliError::invalid_simulation("max_attempts", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(CliError::invalid_simulation("batch_size", "must be at least 1"));
        }
        Ok(())
    }
}

type Aggregator = Arc<Mutex<DispatchAggregator>>;

/// Drives simulated requests through [`CoreServices`]
pub struct Simulation<S: LogStore<Record = RequestLog>> {
    config: SimulationConfig,
    services: CoreServices<SimulatedNodes, S>,
    endpoints: Arc<[String]>,
}

impl<S> Simulation<S>
where
    S: LogStore<Record = RequestLog> + Sync + 'static,
{
    /// # Errors
    /// Invalid simulation parameters or an empty endpoint list.
    pub fn new(
        config: SimulationConfig,
        services: CoreServices<SimulatedNodes, S>,
        endpoints: Vec<String>,
    ) -> Result<Self> {
        config.validate()?;
        if endpoints.is_empty() {
            return Err(CliError::invalid_simulation("endpoints", "at least one endpoint is required"));
        }
        Ok(Self {
            config,
            services,
            endpoints: endpoints.into(),
        })
    }

    /// Submit every request, then shut the services down and report
    ///
    /// Submission blocks on a full queue, so the pool paces the run.
    #[instrument(name = "simulation", skip(self), fields(mode = self.config.mode.as_str()))]
    pub async fn run(self) -> Result<SimulationStats> {
        let started = Instant::now();
        let aggregator: Aggregator = Arc::default();
        let mut submitted = 0;
        let mut rejected = 0;

        info!(
            requests = self.config.requests,
            endpoints = self.endpoints.len(),
            "starting simulation"
        );

        for request_id in 0..self.config.requests {
            let task = self.request_task(request_id, Arc::clone(&aggregator));
            match self.services.pool.submit_blocking(task).await {
                Ok(()) => submitted += 1,
                Err(e) => {
                    warn!(request_id, error = %e, "request not submitted");
                    rejected += 1;
                }
            }
        }

        let shutdown = self.services.shutdown(self.config.shutdown_timeout).await;
        let dispatch = aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        Ok(SimulationStats {
            mode: self.config.mode,
            requests: self.config.requests,
            submitted,
            rejected,
            duration: started.elapsed(),
            dispatch,
            dispatcher: self.services.dispatcher.metrics(),
            pool: self.services.pool.stats(),
            logger: self.services.logger.stats(),
            shutdown,
        })
    }

    fn request_task(&self, request_id: usize, aggregator: Aggregator) -> Task {
        let request = SimulatedRequest {
            id: request_id,
            mode: self.config.mode,
            max_attempts: self.config.max_attempts,
            batch_size: self.config.batch_size,
            chain: self.config.chain.clone(),
            endpoints: Arc::clone(&self.endpoints),
            dispatcher: self.services.dispatcher.clone(),
            logger: self.services.logger.clone(),
            aggregator,
        };

        Task::new(move |ctx| async move { request.execute(ctx).await })
            .with_label(format!("request-{request_id}"))
    }
}

/// Everything one pool task needs to play a client request
struct SimulatedRequest<S: LogStore<Record = RequestLog>> {
    id: usize,
    mode: SimulationMode,
    max_attempts: u32,
    batch_size: usize,
    chain: String,
    endpoints: Arc<[String]>,
    dispatcher: Dispatcher<SimulatedNodes>,
    logger: WriteBehindLogger<S>,
    aggregator: Aggregator,
}

impl<S> SimulatedRequest<S>
where
    S: LogStore<Record = RequestLog> + Sync + 'static,
{
    async fn execute(self, ctx: TaskContext) -> anyhow::Result<()> {
        let timeout = self.dispatcher.config().timeout.min(ctx.remaining());
        let scope = self.dispatcher.scope(ctx.token()).with_timeout(timeout);
        let params = params(self.id);

        let outcome = match self.mode {
            SimulationMode::Failover => scope
                .request_with_failover(&self.endpoints[..], METHOD, params)
                .await
                .map(|result| vec![result]),
            SimulationMode::Fastest => scope
                .request_fastest(&self.endpoints[..], METHOD, params)
                .await
                .map(|result| vec![result]),
            SimulationMode::All => scope.request_all(&self.endpoints[..], METHOD, params).await,
            SimulationMode::Retry => scope
                .request_with_retry(self.endpoint(), METHOD, params, self.max_attempts)
                .await
                .map(|result| vec![result]),
            SimulationMode::Batch => {
                let batch: Vec<MethodCall> = (0..self.batch_size)
                    .map(|i| MethodCall::new(BATCH_METHOD, params_for_block(self.id, i)))
                    .collect();
                scope.batch_request(self.endpoint(), &batch).await
            }
        };

        match outcome {
            Ok(results) => {
                let success = match self.mode {
                    SimulationMode::Batch => results.iter().all(CallResult::is_success),
                    _ => results.iter().any(CallResult::is_success),
                };
                self.observe(|aggregator| {
                    results.iter().for_each(|result| aggregator.update(result));
                    aggregator.record_operation(success);
                });
                for result in &results {
                    self.logger
                        .log(RequestLog::from_call_result(&self.chain, result))
                        .await;
                }
                debug!(request_id = self.id, success, attempts = results.len(), "request finished");
                if success {
                    Ok(())
                } else {
                    Err(anyhow!("request {} had no successful reply", self.id))
                }
            }
            Err(error) => {
                let failed = failed_endpoints(&error);
                self.observe(|aggregator| {
                    failed.iter().for_each(|endpoint| aggregator.record_failure(endpoint));
                    aggregator.record_operation(false);
                });
                for endpoint in &failed {
                    let mut record = RequestLog::new(&self.chain, METHOD, endpoint.as_str());
                    record.status_code = 502;
                    record.error = Some(error.to_string());
                    self.logger.log(record).await;
                }
                Err(anyhow::Error::new(error).context(format!("request {} failed", self.id)))
            }
        }
    }

    /// Round-robin target of single-endpoint modes
    fn endpoint(&self) -> &str {
        &self.endpoints[self.id % self.endpoints.len()]
    }

    fn observe(&self, f: impl FnOnce(&mut DispatchAggregator)) {
        f(&mut self.aggregator.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Endpoints named by a dispatch error
fn failed_endpoints(error: &DispatchError) -> Vec<String> {
    match error {
        DispatchError::RetriesExhausted { endpoint, .. } => vec![endpoint.clone()],
        other => other.failures().iter().map(|f| f.endpoint.clone()).collect(),
    }
}

fn params(id: usize) -> Bytes {
    Bytes::from(serde_json::json!({ "id": id, "params": [] }).to_string())
}

fn params_for_block(id: usize, index: usize) -> Bytes {
    let block = format!("0x{:x}", id * 100 + index);
    Bytes::from(serde_json::json!({ "id": id, "params": [block, false] }).to_string())
}
