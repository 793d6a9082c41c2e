//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{Backoff, CoreConfig, RequestLogStoreKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    timeout_ms: u64,
    pool_workers: usize,
    log_workers: usize,
    node_count: usize,
    active_node_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    timeout_ms: config.dispatcher.timeout_ms,
                    pool_workers: config.worker_pool.workers,
                    log_workers: config.request_log.workers,
                    node_count: config.nodes.len(),
                    active_node_count: config.nodes.iter().filter(|n| n.is_active).count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &CoreConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.nodes.is_empty() {
        warnings.push("No nodes configured - callers must supply endpoints".to_string());
    } else if !config.nodes.iter().any(|n| n.is_active) {
        warnings.push("Every configured node is inactive".to_string());
    }

    let dispatcher = &config.dispatcher;
    let backoff = Backoff::linear(dispatcher.retry_base_interval()).total(dispatcher.max_attempts);
    if backoff >= dispatcher.timeout() {
        warnings.push(format!(
            "Retry backoff ({}ms) reaches dispatcher.timeout_ms ({}ms) - later attempts never run",
            backoff.as_millis(),
            dispatcher.timeout_ms
        ));
    }

    if config.request_log.store == RequestLogStoreKind::Tracing {
        warnings.push("request_log.store is \"tracing\" - records are not persisted to disk".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Dispatch timeout: {}ms", summary.timeout_ms);
            println!("  Pool workers: {}", summary.pool_workers);
            println!("  Log workers: {}", summary.log_workers);
            println!("  Nodes: {} ({} active)", summary.node_count, summary.active_node_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: true,
        }
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/ironnode.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_file_with_warnings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[dispatcher]
timeout_ms = 100
retry_base_interval_ms = 100
max_attempts = 3
"#,
        )
        .unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid);
        assert_eq!(result.summary.as_ref().unwrap().timeout_ms, 100);

        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No nodes configured")));
        assert!(warnings.iter().any(|w| w.contains("Retry backoff (300ms)")));
        assert!(!warnings.iter().any(|w| w.contains("submit_grace_ms")));
    }

    #[test]
    fn test_retry_backoff_within_timeout() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[dispatcher]
timeout_ms = 1000
retry_base_interval_ms = 100
max_attempts = 4
"#,
        )
        .unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid);
        let warnings = result.warnings.unwrap_or_default();
        assert!(!warnings.iter().any(|w| w.contains("Retry backoff")));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[worker_pool]\nworkers = 0\n").unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("workers"));
    }
}
