// core.rs splits ledger primitives into block data and account state.
pub mod chain;
pub mod state;

pub use chain::*;
pub use state::*;
