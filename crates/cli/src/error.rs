//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;
use worker_pool::PoolError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ContractError),

    /// A core service refused to start
    #[error("Failed to start {component}: {source}")]
    ServiceStart {
        component: &'static str,
        #[source]
        source: PoolError,
    },

    /// Simulation parameters out of range
    #[error("Invalid simulation parameter '{field}': {message}")]
    InvalidSimulation { field: &'static str, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn service_start(component: &'static str, source: PoolError) -> Self {
        Self::ServiceStart { component, source }
    }

    pub fn invalid_simulation(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidSimulation {
            field,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
