//! chainspec - fork-aware chain configuration and genesis materialization
//!
//! # Architecture
//!
//! ## Chain Configuration
//! - [`forks`] - Fork registry, features and known bad hashes
//! - [`options`] - Feature option decoding and merging
//! - [`gas_table`] - Gas cost tables and named presets
//! - [`chain_config`] - Protocol predicates and header checkpoint validation
//! - [`external`] - Chain specification files (identity, genesis, forks, peers)
//!
//! ## Ledger
//! - [`blockchain`] - Headers, blocks and account state
//! - [`genesis`] - Genesis dump format and block zero construction
//! - [`persistence`] - Database layer (SQLite) and in-memory store
//!
//! ## Utilities
//! - [`codec`] - Hex string codecs
//! - [`config`] - Node configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Chain Configuration
// ============================================================================
pub mod chain_config;
pub mod external;
pub mod forks;
pub mod gas_table;
pub mod options;

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod genesis;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod codec;
pub mod config;
pub mod error;

pub use chain_config::{ChainConfig, Signer};
pub use error::{ChainError, Result};
pub use external::ExternalChainConfig;
pub use genesis::{write_genesis_block, GenesisDump};
