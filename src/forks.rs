//! Fork registry: named rule changes activated at block heights
//!
//! [`Forks`] is kept sorted ascending by activation block from the moment it
//! is built, so every query borrows it immutably and can hand out ordered
//! slices without re-sorting.

use crate::blockchain::Hash;
use crate::codec::{block_number, hash_hex};
use crate::error::{ChainError, Result};
use crate::options::OptionValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fork {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Block number where the fork commences.
    #[serde(with = "block_number")]
    pub block: u64,
    /// Checkpoint used to reject blocks from a known network split.
    #[serde(default, with = "required_hash", skip_serializing_if = "Option::is_none")]
    pub required_hash: Option<Hash>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Fork {
    pub fn new(id: impl Into<String>, name: impl Into<String>, block: u64) -> Self {
        Fork {
            id: id.into(),
            name: name.into(),
            block,
            required_hash: None,
            features: Vec::new(),
        }
    }

    pub fn with_required_hash(mut self, hash: Hash) -> Self {
        self.required_hash = Some(hash);
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }
}

/// A bundle of options attached to a fork, e.g. a gas reprice or a
/// difficulty bomb delay. Options are decoded by [`crate::options::OptionResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

impl Feature {
    pub fn new(id: impl Into<String>) -> Self {
        Feature {
            id: id.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A block known to carry consensus issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadHash {
    #[serde(rename = "Block", with = "block_number")]
    pub block: u64,
    #[serde(rename = "Hash", with = "hash_hex")]
    pub hash: Hash,
}

/// Forks ordered by activation block. Forks sharing a block keep their
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Fork>", into = "Vec<Fork>")]
pub struct Forks(Vec<Fork>);

impl From<Vec<Fork>> for Forks {
    fn from(mut forks: Vec<Fork>) -> Self {
        forks.sort_by_key(|f| f.block);
        Forks(forks)
    }
}

impl From<Forks> for Vec<Fork> {
    fn from(forks: Forks) -> Self {
        forks.0
    }
}

impl Forks {
    pub fn new(forks: Vec<Fork>) -> Self {
        forks.into()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fork> {
        self.0.iter()
    }

    /// Adds a fork after any existing forks at the same block.
    pub fn insert(&mut self, fork: Fork) {
        let at = self.0.partition_point(|f| f.block <= fork.block);
        self.0.insert(at, fork);
    }

    /// Looks up a fork by its name, assumed to be unique.
    pub fn by_name(&self, name: &str) -> Option<&Fork> {
        self.0.iter().find(|f| f.name == name)
    }

    /// Looks up the fork activated exactly at `block`. With duplicate
    /// heights the last one in order wins.
    pub fn by_block(&self, block: u64) -> Option<&Fork> {
        self.0.iter().rev().find(|f| f.block == block)
    }

    /// All forks activated at or before `block`, ascending.
    pub fn through(&self, block: u64) -> &[Fork] {
        let end = self.0.partition_point(|f| f.block <= block);
        &self.0[..end]
    }

    /// The fork governing `block`: the latest one activated at or before it.
    pub fn most_recent(&self, block: u64) -> Option<&Fork> {
        self.through(block).last()
    }

    /// Rejects forks sharing an activation block.
    pub fn validate(&self) -> Result<()> {
        match self.0.windows(2).find(|w| w[0].block == w[1].block) {
            Some(w) => Err(ChainError::DuplicateForkBlock(w[0].block)),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a Forks {
    type Item = &'a Fork;
    type IntoIter = std::slice::Iter<'a, Fork>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `requiredHash` is optional on the wire; an empty string or the zero hash
/// both mean "no checkpoint".
mod required_hash {
    use crate::blockchain::Hash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Option<Hash>, serializer: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(h) => serializer.serialize_str(&format!("0x{}", hex::encode(h))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Hash>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        if digits.is_empty() {
            return Ok(None);
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(digits, &mut hash).map_err(D::Error::custom)?;
        Ok(if hash == [0u8; 32] { None } else { Some(hash) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Forks {
        Forks::new(vec![
            Fork::new("diehard", "Diehard", 3_000_000),
            Fork::new("homestead", "Homestead", 1_150_000),
            Fork::new("eip150", "GasReprice", 2_500_000),
        ])
    }

    #[test]
    fn test_sorted_on_construction() {
        let blocks: Vec<u64> = registry().iter().map(|f| f.block).collect();
        assert_eq!(blocks, vec![1_150_000, 2_500_000, 3_000_000]);
    }

    #[test]
    fn test_lookup_by_name_and_block() {
        let forks = registry();
        assert_eq!(forks.by_name("GasReprice").map(|f| f.block), Some(2_500_000));
        assert!(forks.by_name("Byzantium").is_none());
        assert_eq!(forks.by_block(3_000_000).map(|f| f.name.as_str()), Some("Diehard"));
        assert!(forks.by_block(3_000_001).is_none());
    }

    #[test]
    fn test_through_is_prefix() {
        let forks = registry();
        assert!(forks.through(0).is_empty());
        assert_eq!(forks.through(1_150_000).len(), 1);
        assert_eq!(forks.through(2_999_999).len(), 2);
        assert_eq!(forks.through(u64::MAX).len(), 3);

        let heights = [0, 1_150_000, 2_000_000, 2_500_000, 3_000_000, 10_000_000];
        for pair in heights.windows(2) {
            let lower = forks.through(pair[0]);
            let upper = forks.through(pair[1]);
            assert!(upper.starts_with(lower));
        }
    }

    #[test]
    fn test_most_recent() {
        let forks = registry();
        assert!(forks.most_recent(1_149_999).is_none());
        assert_eq!(forks.most_recent(2_600_000).map(|f| f.name.as_str()), Some("GasReprice"));
        assert_eq!(forks.most_recent(3_000_000).map(|f| f.name.as_str()), Some("Diehard"));
    }

    #[test]
    fn test_duplicate_heights_are_deterministic() {
        let forks = Forks::new(vec![
            Fork::new("a", "First", 10),
            Fork::new("b", "Second", 10),
        ]);
        assert_eq!(forks.by_block(10).map(|f| f.id.as_str()), Some("b"));
        assert_eq!(forks.most_recent(20).map(|f| f.id.as_str()), Some("b"));
        assert!(matches!(forks.validate(), Err(ChainError::DuplicateForkBlock(10))));
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut forks = registry();
        forks.insert(Fork::new("etf", "ETF", 1_920_000));
        let names: Vec<&str> = forks.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Homestead", "ETF", "GasReprice", "Diehard"]);
    }

    #[test]
    fn test_fork_json() {
        let json = r#"{
            "id": "eip155",
            "name": "Diehard",
            "block": "0x2dc6c0",
            "requiredHash": "",
            "features": [{"id": "gastable", "options": {"gasTable": "diehard"}}]
        }"#;
        let fork: Fork = serde_json::from_str(json).unwrap();
        assert_eq!(fork.block, 3_000_000);
        assert_eq!(fork.required_hash, None);
        assert_eq!(fork.features.len(), 1);

        let decimal: Fork = serde_json::from_str(r#"{"name": "Homestead", "block": 1150000}"#).unwrap();
        assert_eq!(decimal.block, 1_150_000);
    }

    #[test]
    fn test_bad_hash_json() {
        let json = r#"{"Block": 1920000, "Hash": "0x4985f5ca3d2afbec36529aa96f74de3cc10a2a4a6c44f2157a57d2c6059a11bb"}"#;
        let bad: BadHash = serde_json::from_str(json).unwrap();
        assert_eq!(bad.block, 1_920_000);
        assert_eq!(bad.hash[0], 0x49);
    }
}
