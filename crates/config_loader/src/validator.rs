//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the config types (`validator` derive)
//! - node names unique
//! - `json_lines` request log store has a path

use std::collections::HashSet;

use contracts::{ContractError, CoreConfig, RequestLogStoreKind};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed configuration
///
/// Returns the first violation found, or Ok(()).
pub fn validate(config: &CoreConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_node_names(config)?;
    validate_request_log_store(config)?;
    Ok(())
}

fn validate_fields(config: &CoreConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Depth-first, in field-name order, so the reported field is stable
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        let found = match kind {
            ValidationErrorsKind::Field(errs) => errs.first().map(|e| (path, e.to_string())),
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_violation(inner, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn validate_node_names(config: &CoreConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for node in &config.nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("nodes[name={}]", node.name),
                "duplicate node name",
            ));
        }
    }
    Ok(())
}

fn validate_request_log_store(config: &CoreConfig) -> Result<(), ContractError> {
    let log = &config.request_log;
    if log.store == RequestLogStoreKind::JsonLines && log.path.is_none() {
        return Err(ContractError::config_validation(
            "request_log.path",
            "path is required when store = \"json_lines\"",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChainType, NodeDescriptor};

    fn node(name: &str) -> NodeDescriptor {
        NodeDescriptor {
            name: name.into(),
            chain: ChainType::Ethereum,
            network: "mainnet".into(),
            url: format!("https://{name}.example.org"),
            priority: 0,
            is_active: true,
            max_requests: 1000,
        }
    }

    fn minimal_config() -> CoreConfig {
        CoreConfig {
            nodes: vec![node("eth-1"), node("eth-2")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_duplicate_node_name() {
        let mut config = minimal_config();
        config.nodes.push(node("eth-1"));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate node name"), "got: {err}");
    }

    #[test]
    fn test_empty_node_name_reports_path() {
        let mut config = minimal_config();
        config.nodes[1].name = String::new();
        let err = validate(&config).unwrap_err();
        match err {
            ContractError::ConfigValidation { field, .. } => assert_eq!(field, "nodes[1].name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut config = minimal_config();
        config.worker_pool.queue_capacity = 0;
        let err = validate(&config).unwrap_err();
        match err {
            ContractError::ConfigValidation { field, .. } => {
                assert_eq!(field, "worker_pool.queue_capacity")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_lines_without_path() {
        let mut config = minimal_config();
        config.request_log.store = RequestLogStoreKind::JsonLines;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("request_log.path"), "got: {err}");

        config.request_log.path = Some("requests.jsonl".into());
        assert!(validate(&config).is_ok());
    }
}
