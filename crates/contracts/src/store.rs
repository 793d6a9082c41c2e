//! LogStore trait - Write-behind logger output interface
//!
//! Defines the abstract durable-write interface for log records.

use crate::ContractError;

/// Durable write of one log record
///
/// All store implementations must implement this trait.
#[trait_variant::make(LogStore: Send)]
pub trait LocalLogStore {
    /// Record type persisted by this store
    type Record: Send + Sync + 'static;

    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one record
    ///
    /// # Errors
    /// Returns write error (should include context). The logger retries.
    async fn persist(&self, record: &Self::Record) -> Result<(), ContractError>;
}
