//! Error types for chainspec

use thiserror::Error;

/// Failures decoding the hexadecimal strings used across the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("want {want} hexadecimals")]
    Length { want: usize },
    #[error("want {want} hexadecimals with 0x prefix")]
    PrefixedLength { want: usize },
    #[error("want 0x prefix")]
    MissingPrefix,
    #[error("invalid hex: {0}")]
    InvalidDigit(String),
}

impl From<hex::FromHexError> for HexError {
    fn from(err: hex::FromHexError) -> Self {
        HexError::InvalidDigit(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("ChainConfig not found")]
    ConfigNotFound,
    #[error("ChainConfig fork not found: {0}")]
    ForkNotFound(String),
    #[error("duplicate fork activation block {0}")]
    DuplicateForkBlock(u64),
    #[error("known fork hash mismatch at block {block}")]
    KnownForkHash { block: u64 },
    #[error("known bad hash at block {block}")]
    KnownBadHash { block: u64 },
    #[error("Chain configuration contained invalid parameter: key: {key}, val: {value}")]
    InvalidOption { key: String, value: String },
    #[error("Invalid gas table: {0}")]
    InvalidGasTable(String),
    #[error("malformed {field}: {source}")]
    MalformedHex {
        field: String,
        #[source]
        source: HexError,
    },
    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),
    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Json(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
