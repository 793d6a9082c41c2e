//! # Config Loader
//!
//! Loads the dispatch core configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply `IRONNODE_*` environment overrides
//! - Validate configuration legality
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load(Some(Path::new("ironnode.toml"))).unwrap();
//! println!("workers: {}", config.worker_pool.workers);
//! ```

pub mod env;
mod parser;
mod validator;

pub use contracts::CoreConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an optional file, then apply process environment overrides
    ///
    /// Without a path the documented defaults are used.
    ///
    /// # Errors
    /// File read, parse, override or validation failure.
    pub fn load(path: Option<&Path>) -> Result<CoreConfig, ContractError> {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => CoreConfig::default(),
        };
        env::apply_process_overrides(&mut config)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from file path, without environment overrides
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CoreConfig, ContractError> {
        let config = Self::parse_file(path)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<CoreConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built configuration
    pub fn validate(config: &CoreConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &CoreConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &CoreConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn parse_file(path: &Path) -> Result<CoreConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse(&content, format)
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
