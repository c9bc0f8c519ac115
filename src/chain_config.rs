//! Chain configuration: which rules apply at a given block height
//!
//! A [`ChainConfig`] owns the fork registry and the known bad hashes of one
//! network. Protocol predicates compare heights against named forks; option
//! queries fold the features of every fork activated so far.

use crate::blockchain::Header;
use crate::error::{ChainError, Result};
use crate::forks::{BadHash, Fork, Forks};
use crate::gas_table::GasTable;
use crate::options::{FeatureOptions, OptionResolver};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const HOMESTEAD: &str = "Homestead";
pub const ETF: &str = "ETF";
pub const DIEHARD: &str = "Diehard";

/// Transaction signature scheme in force at a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    Basic,
    /// Replay-protected signatures bound to a chain id (EIP-155).
    ChainId(u64),
}

/// Wire shape of a chain configuration.
#[derive(Serialize, Deserialize)]
struct ChainConfigFile {
    #[serde(default)]
    forks: Forks,
    #[serde(default)]
    bad_hashes: Vec<BadHash>,
    #[serde(default)]
    chain_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChainConfigFile", into = "ChainConfigFile")]
pub struct ChainConfig {
    forks: Forks,
    bad_hashes: Vec<BadHash>,
    chain_id: Option<u64>,
    resolver: OptionResolver,
}

impl TryFrom<ChainConfigFile> for ChainConfig {
    type Error = ChainError;

    fn try_from(file: ChainConfigFile) -> Result<Self> {
        file.forks.validate()?;
        Ok(ChainConfig {
            forks: file.forks,
            bad_hashes: file.bad_hashes,
            chain_id: file.chain_id,
            resolver: OptionResolver::default(),
        })
    }
}

impl From<ChainConfig> for ChainConfigFile {
    fn from(config: ChainConfig) -> Self {
        ChainConfigFile {
            forks: config.forks,
            bad_hashes: config.bad_hashes,
            chain_id: config.chain_id,
        }
    }
}

impl ChainConfig {
    /// Builds a configuration, rejecting forks that share an activation block.
    pub fn new(forks: Vec<Fork>, bad_hashes: Vec<BadHash>, chain_id: Option<u64>) -> Result<Self> {
        ChainConfig::try_from(ChainConfigFile {
            forks: Forks::new(forks),
            bad_hashes,
            chain_id,
        })
    }

    /// Replaces the resolver, e.g. to decode against other gas table presets.
    pub fn with_resolver(mut self, resolver: OptionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn forks(&self) -> &Forks {
        &self.forks
    }

    pub fn bad_hashes(&self) -> &[BadHash] {
        &self.bad_hashes
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn add_fork(&mut self, fork: Fork) -> Result<()> {
        if self.forks.by_block(fork.block).is_some() {
            return Err(ChainError::DuplicateForkBlock(fork.block));
        }
        self.forks.insert(fork);
        Ok(())
    }

    pub fn add_bad_hash(&mut self, bad: BadHash) {
        self.bad_hashes.push(bad);
    }

    /// Looks up a fork by name; `None` means the fork is never active.
    pub fn fork(&self, name: &str) -> Option<&Fork> {
        self.forks.by_name(name)
    }

    /// Like [`ChainConfig::fork`] for callers that cannot proceed without it.
    pub fn fork_required(&self, name: &str) -> Result<&Fork> {
        self.fork(name)
            .ok_or_else(|| ChainError::ForkNotFound(name.to_string()))
    }

    pub fn fork_at_block(&self, num: u64) -> Option<&Fork> {
        self.forks.by_block(num)
    }

    /// The most recent fork activated at or before `num`.
    pub fn fork_for_block(&self, num: u64) -> Option<&Fork> {
        self.forks.most_recent(num)
    }

    pub fn forks_through_block(&self, num: u64) -> &[Fork] {
        self.forks.through(num)
    }

    /// Options in effect at `num`, later forks overriding earlier ones.
    pub fn options(&self, num: u64) -> Result<FeatureOptions> {
        self.resolver.resolve(self.forks.through(num))
    }

    fn activated(&self, name: &str, num: u64) -> bool {
        self.fork(name).is_some_and(|f| num >= f.block)
    }

    pub fn is_homestead(&self, num: u64) -> bool {
        self.activated(HOMESTEAD, num)
    }

    /// Whether `num` is exactly the bailout block.
    pub fn is_etf(&self, num: u64) -> bool {
        self.fork(ETF).is_some_and(|f| num == f.block)
    }

    pub fn is_diehard(&self, num: u64) -> bool {
        self.activated(DIEHARD, num)
    }

    /// Whether the difficulty bomb has gone off at `num`: the governing fork
    /// limits itself with a `length` option and `num` lies past that length.
    /// Option decoding errors are returned to the caller.
    pub fn is_explosion(&self, num: u64) -> Result<bool> {
        let opts = self.options(num)?;
        let (Some(fork), Some(length)) = (self.fork_for_block(num), opts.length) else {
            return Ok(false);
        };
        Ok(BigUint::from(num) >= BigUint::from(fork.block) + length)
    }

    /// Gas table in effect at `num`, homestead prices when none is configured.
    pub fn gas_table(&self, num: u64) -> Result<GasTable> {
        Ok(self.options(num)?.gas_table.unwrap_or_else(GasTable::homestead))
    }

    pub fn signer(&self, num: u64) -> Signer {
        match self.chain_id {
            Some(id) if self.is_diehard(num) => Signer::ChainId(id),
            _ => Signer::Basic,
        }
    }

    /// Rejects headers that contradict a fork checkpoint or match a known bad
    /// hash at their height. Both lists are always scanned; a checkpoint
    /// mismatch takes precedence.
    pub fn header_check(&self, header: &Header) -> Result<()> {
        let number = header.number;
        let hash = header.hash();

        let fork_mismatch = self
            .forks
            .iter()
            .filter(|f| f.block == number)
            .any(|f| matches!(f.required_hash, Some(required) if required != hash));

        let known_bad = self
            .bad_hashes
            .iter()
            .filter(|b| b.block == number)
            .any(|b| b.hash == hash);

        if fork_mismatch {
            warn!(block = number, hash = %hex::encode(hash), "Header does not match fork checkpoint");
            return Err(ChainError::KnownForkHash { block: number });
        }
        if known_bad {
            warn!(block = number, hash = %hex::encode(hash), "Header matches known bad hash");
            return Err(ChainError::KnownBadHash { block: number });
        }
        Ok(())
    }
}
