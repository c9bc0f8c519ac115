//! Hexadecimal string codecs used by the genesis and chain configuration formats
//!
//! Two flavours appear on the wire:
//! - [`HexString`]: bare hex of a fixed width (allocation addresses, storage slots)
//! - [`PrefixedHex`]: `0x`-prefixed hex where `""` and `"0x"` both mean "nothing"

use crate::error::HexError;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A hexadecimal string without prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexString(pub String);

impl HexString {
    pub fn new(s: impl Into<String>) -> Self {
        HexString(s.into())
    }

    pub fn encode(bytes: &[u8]) -> Self {
        HexString(hex::encode(bytes))
    }

    /// Fills `buf` exactly; the string must hold `2 * buf.len()` digits.
    pub fn decode(&self, buf: &mut [u8]) -> Result<(), HexError> {
        if self.0.len() != 2 * buf.len() {
            return Err(HexError::Length { want: 2 * buf.len() });
        }
        hex::decode_to_slice(&self.0, buf)?;
        Ok(())
    }

    pub fn decode_array<const N: usize>(&self) -> Result<[u8; N], HexError> {
        let mut buf = [0u8; N];
        self.decode(&mut buf)?;
        Ok(buf)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HexString {
    fn from(s: &str) -> Self {
        HexString(s.to_string())
    }
}

/// A hexadecimal string with an "0x" prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixedHex(pub String);

impl PrefixedHex {
    pub fn new(s: impl Into<String>) -> Self {
        PrefixedHex(s.into())
    }

    pub fn encode(bytes: &[u8]) -> Self {
        PrefixedHex(format!("0x{}", hex::encode(bytes)))
    }

    /// Minimal big-endian form, `0x0` for zero.
    pub fn from_big_uint(value: &BigUint) -> Self {
        PrefixedHex(format!("0x{}", value.to_str_radix(16)))
    }

    /// Returns the digits after the prefix, or `None` for the empty forms.
    fn digits(&self) -> Result<Option<&str>, HexError> {
        let s = self.0.as_str();
        if s.is_empty() {
            return Ok(None);
        }
        let digits = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
        if digits.is_empty() {
            return Ok(None);
        }
        Ok(Some(digits))
    }

    /// Fills `buf` when the value is not empty. Empty values leave `buf` untouched.
    pub fn decode(&self, buf: &mut [u8]) -> Result<(), HexError> {
        let Some(digits) = self.digits()? else {
            return Ok(());
        };
        if digits.len() != 2 * buf.len() {
            return Err(HexError::PrefixedLength { want: 2 * buf.len() });
        }
        hex::decode_to_slice(digits, buf)?;
        Ok(())
    }

    pub fn decode_array<const N: usize>(&self) -> Result<[u8; N], HexError> {
        let mut buf = [0u8; N];
        self.decode(&mut buf)?;
        Ok(buf)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HexError> {
        match self.digits()? {
            None => Ok(Vec::new()),
            Some(digits) => Ok(hex::decode(digits)?),
        }
    }

    /// Big-endian magnitude of the decoded bytes; the empty forms are zero.
    pub fn to_big_uint(&self) -> Result<BigUint, HexError> {
        Ok(BigUint::from_bytes_be(&self.to_bytes()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrefixedHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrefixedHex {
    fn from(s: &str) -> Self {
        PrefixedHex(s.to_string())
    }
}

/// Parses an unsigned integer, picking the base from its prefix: `0x` hex,
/// `0b` binary, `0o` or a bare leading `0` octal, decimal otherwise.
/// Underscores are accepted only after a base prefix, between the prefix and
/// a digit or between two digits.
pub fn parse_big_uint(s: &str) -> Option<BigUint> {
    let s = s.strip_prefix('+').unwrap_or(s);
    let lower = s.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits, prefixed) = match lower.as_deref() {
        Some("0x") => (16, &s[2..], true),
        Some("0b") => (2, &s[2..], true),
        Some("0o") => (8, &s[2..], true),
        _ if s.len() > 1 && s.starts_with('0') => (8, &s[1..], true),
        _ => (10, s, false),
    };
    if digits.is_empty() || digits.ends_with('_') {
        return None;
    }
    if digits.contains('_') && (!prefixed || digits.contains("__")) {
        return None;
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if !cleaned.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigUint::parse_bytes(cleaned.as_bytes(), radix)
}

/// Serde helpers for `0x`-prefixed 32-byte hashes.
pub mod hash_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(hash)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let mut hash = [0u8; 32];
        hex::decode_to_slice(digits, &mut hash).map_err(D::Error::custom)?;
        Ok(hash)
    }
}

/// Serde helpers for block numbers written either as JSON numbers or as
/// decimal / `0x` strings.
pub mod block_number {
    use super::parse_big_uint;
    use num_traits::ToPrimitive;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(number: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*number)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => parse_big_uint(&s)
                .and_then(|n| n.to_u64())
                .ok_or_else(|| D::Error::custom(format!("invalid block number {:?}", s))),
        }
    }
}

/// Serde helpers for optional big integers written as decimal strings. Reads
/// accept any form [`parse_big_uint`] does, or a JSON number.
pub mod big_uint_opt {
    use super::parse_big_uint;
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => serializer.serialize_str(&n.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigUint>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(BigUint::from(n))),
            Some(Raw::Text(s)) => parse_big_uint(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid integer {:?}", s))),
        }
    }
}
