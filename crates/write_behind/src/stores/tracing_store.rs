//! TracingStore - emits request log records as structured events

use contracts::{ContractError, LogStore, RequestLog};
use tracing::{info, instrument};

/// Store that writes each record as one `info` event on the `request_log` target
pub struct TracingStore {
    name: String,
}

impl TracingStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TracingStore {
    fn default() -> Self {
        Self::new("tracing")
    }
}

impl LogStore for TracingStore {
    type Record = RequestLog;

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "tracing_store_persist",
        skip(self, record),
        fields(store = %self.name, id = %record.id)
    )]
    async fn persist(&self, record: &RequestLog) -> Result<(), ContractError> {
        info!(
            target: "request_log",
            blockchain = %record.blockchain,
            method = %record.method,
            endpoint = %record.endpoint,
            status = record.status_code,
            response_time_ms = record.response_time_ms,
            request_size = record.request_size,
            response_size = record.response_size,
            user_id = ?record.user_id,
            error = record.error.as_deref().unwrap_or(""),
            "request"
        );
        Ok(())
    }
}
