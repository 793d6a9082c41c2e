//! Endpoint call data model
//!
//! One [`EndpointCall`] is issued per attempt and produces exactly one [`CallResult`].

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Immutable request against one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCall {
    /// Target identifier (URL or address)
    pub endpoint: String,
    /// Remote method name
    pub method: String,
    /// Opaque parameter bytes
    pub params: Bytes,
}

impl EndpointCall {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        params: impl Into<Bytes>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            params: params.into(),
        }
    }
}

/// Method and parameters without a target, used for batches against one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub params: Bytes,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, params: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            params: params.into(),
        }
    }

    /// Bind this call to an endpoint
    pub fn to_endpoint(&self, endpoint: &str) -> EndpointCall {
        EndpointCall {
            endpoint: endpoint.to_string(),
            method: self.method.clone(),
            params: self.params.clone(),
        }
    }
}

/// Successful reply of a remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReply {
    pub payload: Bytes,
    /// Time the remote call reports it spent
    pub elapsed: Duration,
}

impl CallReply {
    pub fn new(payload: impl Into<Bytes>, elapsed: Duration) -> Self {
        Self {
            payload: payload.into(),
            elapsed,
        }
    }
}

/// Per-attempt failure of one remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Connection-level failure (DNS, TCP, TLS, broken stream)
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The dispatch deadline elapsed before the attempt reported
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The dispatch was cancelled before the attempt reported
    #[error("cancelled")]
    Cancelled,

    /// The attempt task ended without producing a result
    #[error("attempt ended without a result")]
    Abandoned,
}

impl CallError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Deadline or cancellation, never retried
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}

/// Outcome of one attempt, as observed by an aggregator
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Endpoint the attempt was issued to
    pub endpoint: String,
    /// Method of the attempt
    pub method: String,
    /// Reply payload (empty on error)
    pub payload: Bytes,
    /// Reported elapsed on success, measured wall time on failure
    pub elapsed: Duration,
    pub error: Option<CallError>,
}

impl CallResult {
    /// Build a result from the outcome of a remote call
    pub fn from_outcome(
        call: &EndpointCall,
        outcome: Result<CallReply, CallError>,
        measured: Duration,
    ) -> Self {
        match outcome {
            Ok(reply) => Self {
                endpoint: call.endpoint.clone(),
                method: call.method.clone(),
                payload: reply.payload,
                elapsed: reply.elapsed,
                error: None,
            },
            Err(error) => Self::failed(call, error, measured),
        }
    }

    pub fn failed(call: &EndpointCall, error: CallError, elapsed: Duration) -> Self {
        Self {
            endpoint: call.endpoint.clone(),
            method: call.method.clone(),
            payload: Bytes::new(),
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Deadline-bound cancellable context handed to every attempt
///
/// The call implementation is expected to observe [`CallContext::done`];
/// the core only propagates the signal.
#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Instant,
}

impl CallContext {
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Context with a fresh token expiring after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once passed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// The reason this context is done, if it is
    pub fn interruption(&self) -> Option<CallError> {
        if self.token.is_cancelled() {
            Some(CallError::Cancelled)
        } else if Instant::now() >= self.deadline {
            Some(CallError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves on cancellation or deadline, whichever comes first
    pub async fn done(&self) -> CallError {
        tokio::select! {
            _ = self.token.cancelled() => CallError::Cancelled,
            _ = tokio::time::sleep_until(self.deadline) => CallError::DeadlineExceeded,
        }
    }
}
