//! Dispatcher error types

use std::fmt;
use std::time::Duration;

use contracts::CallError;
use thiserror::Error;

/// One failed attempt, tagged with the endpoint it was issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: CallError,
}

impl EndpointFailure {
    pub fn new(endpoint: impl Into<String>, error: CallError) -> Self {
        Self {
            endpoint: endpoint.into(),
            error,
        }
    }
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint {}: {}", self.endpoint, self.error)
    }
}

fn list(failures: &[EndpointFailure]) -> String {
    if failures.is_empty() {
        return "no attempt reported".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Empty endpoint list
    #[error("no endpoints provided")]
    NoEndpoints,

    /// Empty batch
    #[error("no requests provided")]
    NoRequests,

    /// Retry bound of zero
    #[error("max_attempts must be at least 1")]
    NoAttempts,

    /// Every attempt reported a failure
    #[error("all endpoints failed: {}", list(.failures))]
    AllFailed { failures: Vec<EndpointFailure> },

    /// The deadline elapsed before any success
    #[error("timed out after {timeout:?}: {}", list(.failures))]
    TimedOut {
        timeout: Duration,
        failures: Vec<EndpointFailure>,
    },

    /// The caller cancelled the dispatch before any success
    #[error("dispatch cancelled: {}", list(.failures))]
    Cancelled { failures: Vec<EndpointFailure> },

    /// Sequential retry gave up
    #[error("request to '{endpoint}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: CallError,
    },
}

impl DispatchError {
    /// Per-endpoint causes carried by this error
    pub fn failures(&self) -> &[EndpointFailure] {
        match self {
            Self::AllFailed { failures }
            | Self::TimedOut { failures, .. }
            | Self::Cancelled { failures } => failures,
            _ => &[],
        }
    }

    /// Input validation error, signalled before any attempt
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NoEndpoints | Self::NoRequests | Self::NoAttempts)
    }

    /// Deadline or caller cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Cancelled { .. })
    }

    pub(crate) fn interrupted(
        reason: &CallError,
        timeout: Duration,
        failures: Vec<EndpointFailure>,
    ) -> Self {
        match reason {
            CallError::DeadlineExceeded => Self::TimedOut { timeout, failures },
            _ => Self::Cancelled { failures },
        }
    }
}
