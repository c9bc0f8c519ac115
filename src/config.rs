//! Node configuration for chainspec tools

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChainSection {
    /// External chain configuration file (JSON).
    #[serde(default = "default_chain_config_path")]
    pub config_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            config_path: default_chain_config_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_data_path() -> String {
    "./data/chaindata.sqlite".to_string()
}

fn default_chain_config_path() -> String {
    "./chain.json".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Parses and validates a TOML configuration.
pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(config_str).map_err(|e| ChainError::InvalidConfig(e.to_string()))?;

    // Validate critical values
    if config.database.path.is_empty() {
        return Err(ChainError::InvalidConfig("database.path must be set".to_string()));
    }
    if config.chain.config_path.is_empty() {
        return Err(ChainError::InvalidConfig("chain.config_path must be set".to_string()));
    }

    Ok(config)
}

/// Loads the configuration at `path`; a missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(config_str) => parse_config(&config_str)
            .map_err(|e| ChainError::InvalidConfig(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(ChainError::IoError(format!("{}: {}", path.display(), e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = parse_config(
            r#"
            [database]
            path = "/var/lib/chain/db.sqlite"

            [logging]
            filter = "chainspec=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/var/lib/chain/db.sqlite");
        assert_eq!(config.chain.config_path, "./chain.json");
        assert_eq!(config.logging.filter, "chainspec=debug");
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let err = parse_config("[database]\npath = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("database.path"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        assert_eq!(load_config("/nonexistent/config.toml").unwrap(), Config::default());
    }
}
