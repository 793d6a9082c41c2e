//! Concrete request log stores

mod json_lines;
mod tracing_store;

pub use self::json_lines::JsonLinesStore;
pub use self::tracing_store::TracingStore;

use contracts::{ContractError, LogStore, RequestLog, RequestLogSettings, RequestLogStoreKind};

/// Store selected by configuration
pub enum RequestLogStore {
    Tracing(TracingStore),
    JsonLines(JsonLinesStore<RequestLog>),
}

impl RequestLogStore {
    /// Build the store named by `settings.store`
    ///
    /// # Errors
    /// `ConfigValidation` when `json_lines` has no path, `Io` when the
    /// output directory cannot be created.
    pub fn from_settings(settings: &RequestLogSettings) -> Result<Self, ContractError> {
        match settings.store {
            RequestLogStoreKind::Tracing => Ok(Self::Tracing(TracingStore::default())),
            RequestLogStoreKind::JsonLines => {
                let path = settings.path.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        "request_log.path",
                        "required when store = \"json_lines\"",
                    )
                })?;
                Ok(Self::JsonLines(JsonLinesStore::new("json_lines", path)?))
            }
        }
    }
}

impl LogStore for RequestLogStore {
    type Record = RequestLog;

    fn name(&self) -> &str {
        match self {
            Self::Tracing(store) => store.name(),
            Self::JsonLines(store) => store.name(),
        }
    }

    async fn persist(&self, record: &RequestLog) -> Result<(), ContractError> {
        match self {
            Self::Tracing(store) => store.persist(record).await,
            Self::JsonLines(store) => store.persist(record).await,
        }
    }
}
