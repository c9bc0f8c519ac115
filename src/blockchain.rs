// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// block/header types and the account state used to build genesis.

pub mod core;
pub use core::*;
