//! Simulated blockchain nodes
//!
//! Every endpoint answers after a randomized latency and fails with a fixed
//! probability. Attempts observe the call context and stop early once the
//! dispatcher cancels them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{
    order_endpoints, CallContext, CallError, CallReply, EndpointCall, NodeDescriptor, RemoteCall,
};
use rand::Rng;
use tokio::time::Instant;
use tracing::trace;

use crate::error::{CliError, Result};

/// Latency and failure profile shared by every simulated endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeProfile {
    /// Median reply latency
    pub latency: Duration,
    /// Relative spread around `latency`, in `[0, 1]`
    pub jitter: f64,
    /// Probability that an attempt fails, in `[0, 1]`
    pub failure_rate: f64,
}

impl Default for NodeProfile {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            jitter: 0.5,
            failure_rate: 0.1,
        }
    }
}

impl NodeProfile {
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate,
            ..Self::default()
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// # Errors
    /// `InvalidSimulation` when a probability or the jitter leaves `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(CliError::invalid_simulation(
                "failure_rate",
                format!("{} is not within [0, 1]", self.failure_rate),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(CliError::invalid_simulation(
                "jitter",
                format!("{} is not within [0, 1]", self.jitter),
            ));
        }
        Ok(())
    }
}

/// [`RemoteCall`] backed by a [`NodeProfile`]
#[derive(Debug, Default)]
pub struct SimulatedNodes {
    profile: NodeProfile,
    calls: AtomicU64,
}

impl SimulatedNodes {
    pub fn new(profile: NodeProfile) -> Self {
        Self {
            profile,
            calls: AtomicU64::new(0),
        }
    }

    pub fn profile(&self) -> &NodeProfile {
        &self.profile
    }

    /// Attempts received so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Latency and failure draw for one attempt
    fn draw(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let spread = self.profile.jitter.clamp(0.0, 1.0);
        let factor = if spread > 0.0 {
            rng.random_range(1.0 - spread..=1.0 + spread)
        } else {
            1.0
        };
        let fails = rng.random_bool(self.profile.failure_rate.clamp(0.0, 1.0));
        (self.profile.latency.mul_f64(factor), fails)
    }
}

impl RemoteCall for SimulatedNodes {
    async fn call(
        &self,
        request: &EndpointCall,
        ctx: &CallContext,
    ) -> std::result::Result<CallReply, CallError> {
        let id = self.calls.fetch_add(1, Ordering::Relaxed);
        let (delay, fails) = self.draw();
        let started = Instant::now();

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            reason = ctx.done() => {
                trace!(endpoint = %request.endpoint, id, "simulated attempt interrupted");
                return Err(reason);
            }
        }

        if fails {
            return Err(CallError::upstream(format!(
                "{} answered HTTP 503",
                request.endpoint
            )));
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": format!("0x{id:x}"),
        });
        Ok(CallReply::new(body.to_string(), started.elapsed()))
    }
}

/// Endpoints to target: configured active nodes by priority, otherwise
/// `count` synthetic ones
pub fn simulated_endpoints(nodes: &[NodeDescriptor], count: usize) -> Vec<String> {
    let configured = order_endpoints(nodes);
    if !configured.is_empty() {
        return configured;
    }
    (0..count).map(|i| format!("sim://node-{i}")).collect()
}
