//! Worker pool errors

use thiserror::Error;

/// Worker pool error
///
/// Queue saturation is not an error: `submit` reports it as `false`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Rejected construction parameter
    #[error("invalid pool config '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },

    /// The pool is shutting down or stopped and accepts no tasks
    #[error("worker pool is closed")]
    Closed,
}

impl PoolError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
