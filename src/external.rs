//! Self-contained chain specification files
//!
//! An [`ExternalChainConfig`] bundles everything needed to join a network:
//! identity, genesis, fork configuration and bootstrap peers.

use crate::chain_config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::genesis::GenesisDump;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Bootstrap peer record, kept verbatim (usually an enode URL).
pub type BootstrapNode = serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalChainConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genesis: Option<GenesisDump>,
    #[serde(rename = "chainConfig", default)]
    pub chain_config: Option<ChainConfig>,
    #[serde(default)]
    pub bootstrap: Vec<BootstrapNode>,
}

impl ExternalChainConfig {
    pub fn genesis(&self) -> Result<&GenesisDump> {
        self.genesis.as_ref().ok_or(ChainError::ConfigNotFound)
    }

    pub fn chain_config(&self) -> Result<&ChainConfig> {
        self.chain_config.as_ref().ok_or(ChainError::ConfigNotFound)
    }

    /// Serializes the configuration as 4-space indented JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)
            .map_err(|e| ChainError::Json(format!("Could not marshal json from chain config: {}", e)))?;
        Ok(out)
    }

    /// Writes the configuration to `path`, replacing any existing file.
    /// The path is used as given.
    pub fn write_to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| {
            ChainError::IoError(format!(
                "Could not write external chain config file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), id = %self.id, "Wrote external chain config");
        Ok(())
    }
}

/// Reads an external chain configuration from `path`. No checks are made on
/// the path.
pub fn read_chain_config_from_json_file(path: impl AsRef<Path>) -> Result<ExternalChainConfig> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        ChainError::IoError(format!(
            "failed to read external chain configuration file {}: {}",
            path.display(),
            e
        ))
    })?;
    let config: ExternalChainConfig = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ChainError::Json(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), id = %config.id, name = %config.name, "Loaded external chain config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_are_config_not_found() {
        let config: ExternalChainConfig = serde_json::from_str(r#"{"id": "dev", "name": "Dev"}"#).unwrap();
        assert!(matches!(config.genesis(), Err(ChainError::ConfigNotFound)));
        assert!(matches!(config.chain_config(), Err(ChainError::ConfigNotFound)));
        assert!(config.bootstrap.is_empty());
    }

    #[test]
    fn test_json_uses_four_space_indent() {
        let config = ExternalChainConfig {
            id: "dev".to_string(),
            name: "Dev".to_string(),
            ..Default::default()
        };
        let json = String::from_utf8(config.to_json().unwrap()).unwrap();
        assert!(json.contains("\n    \"id\": \"dev\""));
        assert!(json.contains("\"chainConfig\": null"));
    }

    #[test]
    fn test_read_missing_file_keeps_path() {
        let err = read_chain_config_from_json_file("/nonexistent/chain.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chain.json"));
    }
}
