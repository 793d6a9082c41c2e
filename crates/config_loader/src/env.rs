//! Environment variable overrides
//!
//! Applied after parsing and before validation.

use contracts::{ContractError, CoreConfig};
use tracing::debug;

/// Default dispatch timeout, milliseconds
pub const DISPATCH_TIMEOUT_MS: &str = "IRONNODE_DISPATCH_TIMEOUT_MS";
/// Retry backoff base, milliseconds
pub const RETRY_BASE_MS: &str = "IRONNODE_RETRY_BASE_MS";
pub const POOL_WORKERS: &str = "IRONNODE_POOL_WORKERS";
pub const POOL_QUEUE_CAPACITY: &str = "IRONNODE_POOL_QUEUE_CAPACITY";
pub const LOG_WORKERS: &str = "IRONNODE_LOG_WORKERS";
pub const LOG_QUEUE_CAPACITY: &str = "IRONNODE_LOG_QUEUE_CAPACITY";

/// Apply overrides found through `lookup`
///
/// # Errors
/// `ConfigParse` when a present variable is not a valid number.
pub fn apply_overrides<F>(config: &mut CoreConfig, lookup: F) -> Result<(), ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read(&lookup, DISPATCH_TIMEOUT_MS)? {
        config.dispatcher.timeout_ms = v;
    }
    if let Some(v) = read(&lookup, RETRY_BASE_MS)? {
        config.dispatcher.retry_base_interval_ms = v;
    }
    if let Some(v) = read(&lookup, POOL_WORKERS)? {
        config.worker_pool.workers = v;
    }
    if let Some(v) = read(&lookup, POOL_QUEUE_CAPACITY)? {
        config.worker_pool.queue_capacity = v;
    }
    if let Some(v) = read(&lookup, LOG_WORKERS)? {
        config.request_log.workers = v;
    }
    if let Some(v) = read(&lookup, LOG_QUEUE_CAPACITY)? {
        config.request_log.queue_capacity = v;
    }
    Ok(())
}

/// Apply overrides from the process environment
pub fn apply_process_overrides(config: &mut CoreConfig) -> Result<(), ContractError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn read<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ContractError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw
        .trim()
        .parse()
        .map_err(|e| ContractError::config_parse(format!("{key}={raw:?}: {e}")))?;
    debug!(key, value = %raw.trim(), "config override from environment");
    Ok(Some(value))
}
