//! RequestLog - record persisted by the write-behind logger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CallResult;

/// One gateway request, as written to the request log store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub blockchain: String,
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    /// Milliseconds
    pub response_time_ms: u64,
    /// Bytes
    pub request_size: u64,
    /// Bytes
    pub response_size: u64,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestLog {
    /// Create a record with a fresh id and the current timestamp
    pub fn new(
        blockchain: impl Into<String>,
        method: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            api_key_id: None,
            blockchain: blockchain.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            status_code: 200,
            response_time_ms: 0,
            request_size: 0,
            response_size: 0,
            ip_address: String::new(),
            user_agent: String::new(),
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Record describing a dispatched call
    ///
    /// Failed calls are logged with status 502.
    pub fn from_call_result(blockchain: impl Into<String>, result: &CallResult) -> Self {
        let mut log = Self::new(blockchain, &result.method, &result.endpoint);
        log.response_time_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX);
        log.response_size = result.payload.len() as u64;
        if let Some(ref error) = result.error {
            log.status_code = 502;
            log.error = Some(error.to_string());
        }
        log
    }

    pub fn with_user(mut self, user_id: Uuid, api_key_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self.api_key_id = Some(api_key_id);
        self
    }

    pub fn with_request_size(mut self, bytes: u64) -> Self {
        self.request_size = bytes;
        self
    }

    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }
}
