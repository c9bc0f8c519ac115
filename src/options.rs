//! Feature option decoding and chronological merging
//!
//! Raw feature options are untyped key/value pairs. Each key is normalized
//! (non-letters dropped, lowercased) and dispatched to a typed field of
//! [`FeatureOptions`]. Unknown keys are errors so that configuration typos
//! fail loudly.

use crate::codec::{big_uint_opt, parse_big_uint};
use crate::error::{ChainError, Result};
use crate::forks::{Feature, Fork};
use crate::gas_table::{GasTable, GasTablePresets};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// A raw option value as it appears in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    Number(serde_json::Number),
    /// An embedded object or array, e.g. an inline gas table.
    Structured(serde_json::Value),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(s) => f.write_str(s),
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Structured(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

impl From<u64> for OptionValue {
    fn from(n: u64) -> Self {
        OptionValue::Number(n.into())
    }
}

impl From<serde_json::Value> for OptionValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => OptionValue::Text(s),
            serde_json::Value::Number(n) => OptionValue::Number(n),
            other => OptionValue::Structured(other),
        }
    }
}

/// Typed options in effect at some block. `None` means "not specified", which
/// lets a later fork override only what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOptions {
    pub gas_table: Option<GasTable>,
    /// Length of the fork, if limited.
    #[serde(default, with = "big_uint_opt")]
    pub length: Option<BigUint>,
    #[serde(default, with = "big_uint_opt")]
    pub chain_id: Option<BigUint>,
    /// Identifier of the difficulty algorithm.
    pub difficulty: Option<String>,
}

impl FeatureOptions {
    /// Merges `incoming` onto `self`; every field `incoming` sets wins.
    /// Callers merge in ascending block order.
    pub fn merge(&mut self, incoming: FeatureOptions) {
        if incoming.gas_table.is_some() {
            self.gas_table = incoming.gas_table;
        }
        if incoming.length.is_some() {
            self.length = incoming.length;
        }
        if incoming.chain_id.is_some() {
            self.chain_id = incoming.chain_id;
        }
        if incoming.difficulty.is_some() {
            self.difficulty = incoming.difficulty;
        }
    }

    pub fn is_unset(&self) -> bool {
        *self == FeatureOptions::default()
    }
}

/// Lowercases and strips everything but ASCII letters: `"gas_Table"` -> `"gastable"`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Decodes feature options against a fixed set of named gas tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionResolver {
    presets: GasTablePresets,
}

impl OptionResolver {
    pub fn new(presets: GasTablePresets) -> Self {
        Self { presets }
    }

    /// Decodes every option of a single feature. The feature is all or
    /// nothing: on error no field of it is returned.
    pub fn decode(&self, feature: &Feature) -> Result<FeatureOptions> {
        let mut opts = FeatureOptions::default();
        for (key, value) in &feature.options {
            match normalize_key(key).as_str() {
                "gastable" => opts.gas_table = Some(self.decode_gas_table(key, value)?),
                "length" => opts.length = Some(decode_integer(key, value)?),
                "chainid" => opts.chain_id = Some(decode_integer(key, value)?),
                "difficulty" => match value {
                    OptionValue::Text(s) => opts.difficulty = Some(s.clone()),
                    _ => return Err(invalid_option(key, value)),
                },
                _ => return Err(invalid_option(key, value)),
            }
        }
        Ok(opts)
    }

    /// Folds the options of `forks` (ascending by block) and of their
    /// features (declaration order) into one record. No forks, no options.
    pub fn resolve(&self, forks: &[Fork]) -> Result<FeatureOptions> {
        let mut resolved = FeatureOptions::default();
        for fork in forks {
            for feature in &fork.features {
                let opts = self.decode(feature).map_err(|e| {
                    debug!(fork = %fork.name, feature = %feature.id, "failed to decode feature options: {}", e);
                    e
                })?;
                resolved.merge(opts);
            }
        }
        Ok(resolved)
    }

    fn decode_gas_table(&self, key: &str, value: &OptionValue) -> Result<GasTable> {
        match value {
            OptionValue::Text(s) => {
                match serde_json::from_str::<GasTable>(s) {
                    Ok(table) if !table.is_empty() => return Ok(table),
                    Ok(_) => {}
                    Err(e) if looks_like_json(s) => {
                        return Err(ChainError::InvalidGasTable(format!("{}: {}", s, e)))
                    }
                    Err(_) => {}
                }
                self.presets
                    .get(s)
                    .cloned()
                    .ok_or_else(|| ChainError::InvalidGasTable(format!("unknown gas table {:?}", s)))
            }
            OptionValue::Structured(v) => {
                let table: GasTable = serde_json::from_value(v.clone())
                    .map_err(|e| ChainError::InvalidGasTable(format!("{}: {}", v, e)))?;
                if table.is_empty() {
                    return Err(ChainError::InvalidGasTable(format!("empty gas table {}", v)));
                }
                Ok(table)
            }
            OptionValue::Number(_) => Err(invalid_option(key, value)),
        }
    }
}

fn looks_like_json(s: &str) -> bool {
    matches!(s.trim_start().chars().next(), Some('{') | Some('['))
}

fn decode_integer(key: &str, value: &OptionValue) -> Result<BigUint> {
    let parsed = match value {
        OptionValue::Text(s) => parse_big_uint(s),
        OptionValue::Number(n) => n.as_u64().map(BigUint::from),
        OptionValue::Structured(_) => None,
    };
    parsed.ok_or_else(|| invalid_option(key, value))
}

fn invalid_option(key: &str, value: &OptionValue) -> ChainError {
    ChainError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}
