//! Configuration parsing
//!
//! TOML (primary) and JSON (secondary).

use contracts::{ContractError, CoreConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<CoreConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<CoreConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<CoreConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChainType, RequestLogStoreKind};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[dispatcher]
timeout_ms = 5000
retry_base_interval_ms = 50

[worker_pool]
workers = 4
queue_capacity = 64

[request_log]
store = "json_lines"
path = "logs/requests.jsonl"

[[nodes]]
name = "eth-1"
chain = "ethereum"
url = "https://eth-1.example.org"
priority = 10
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.dispatcher.timeout_ms, 5000);
        assert_eq!(config.dispatcher.max_attempts, 3);
        assert_eq!(config.worker_pool.workers, 4);
        assert_eq!(config.worker_pool.task_timeout_ms, 30_000);
        assert_eq!(config.request_log.store, RequestLogStoreKind::JsonLines);
        assert_eq!(config.nodes[0].chain, ChainType::Ethereum);
        assert_eq!(config.nodes[0].network, "mainnet");
        assert!(config.nodes[0].is_active);
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let config = parse_toml("").unwrap();
        assert_eq!(config.worker_pool.queue_capacity, 1000);
        assert_eq!(config.request_log.workers, 5);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "worker_pool": { "workers": 2 },
            "nodes": [{ "name": "tron-1", "chain": "tron", "url": "https://api.trongrid.io" }]
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.worker_pool.workers, 2);
        assert_eq!(config.nodes[0].chain, ChainType::Tron);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_chain_rejected() {
        let content = r#"
[[nodes]]
name = "x"
chain = "dogecoin"
url = "https://doge.example.org"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
