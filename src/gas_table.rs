//! Gas cost tables selectable per fork through the `gasTable` feature option

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-opcode gas prices that changed across protocol upgrades.
/// Fields left unset were not specified by the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GasTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extcode_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extcode_copy: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_load: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suicide: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_byte: Option<u64>,
    /// Cost of creating an account while suiciding into it; `None` before EIP-150.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_by_suicide: Option<u64>,
}

impl GasTable {
    pub fn is_empty(&self) -> bool {
        *self == GasTable::default()
    }

    pub fn homestead() -> Self {
        GasTable {
            extcode_size: Some(20),
            extcode_copy: Some(20),
            balance: Some(20),
            s_load: Some(50),
            calls: Some(40),
            suicide: Some(0),
            exp_byte: Some(10),
            create_by_suicide: None,
        }
    }

    /// EIP-150 repricing of IO-heavy operations.
    pub fn eip150() -> Self {
        GasTable {
            extcode_size: Some(700),
            extcode_copy: Some(700),
            balance: Some(400),
            s_load: Some(200),
            calls: Some(700),
            suicide: Some(5000),
            exp_byte: Some(10),
            create_by_suicide: Some(25000),
        }
    }

    /// EIP-150 prices plus the EIP-160 EXP byte increase.
    pub fn diehard() -> Self {
        GasTable {
            exp_byte: Some(50),
            ..GasTable::eip150()
        }
    }
}

/// Read-only table of named gas tables a configuration may refer to by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTablePresets {
    tables: HashMap<String, GasTable>,
}

impl GasTablePresets {
    pub fn new(tables: HashMap<String, GasTable>) -> Self {
        Self { tables }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// The tables shipped with the node: `homestead`, `eip150` and `diehard`.
    pub fn builtin() -> Self {
        let tables = [
            ("homestead", GasTable::homestead()),
            ("eip150", GasTable::eip150()),
            ("diehard", GasTable::diehard()),
        ]
        .into_iter()
        .map(|(name, table)| (name.to_string(), table))
        .collect();
        Self::new(tables)
    }

    pub fn get(&self, name: &str) -> Option<&GasTable> {
        self.tables.get(name)
    }
}

impl Default for GasTablePresets {
    fn default() -> Self {
        Self::builtin()
    }
}
