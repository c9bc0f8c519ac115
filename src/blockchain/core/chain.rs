use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];
pub type Address = [u8; 20];
pub type BlockNonce = [u8; 8];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: Hash,
    pub coinbase: Address,
    /// Root of the account state after this block.
    pub root: Hash,
    pub difficulty: BigUint,
    pub number: u64,
    pub gas_limit: BigUint,
    pub time: BigUint,
    pub extra: Vec<u8>,
    pub mix_digest: Hash,
    pub nonce: BlockNonce,
}

impl Header {
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.parent_hash);
        hasher.update(self.coinbase);
        hasher.update(self.root);
        update_var(&mut hasher, &self.difficulty.to_bytes_be());
        hasher.update(self.number.to_be_bytes());
        update_var(&mut hasher, &self.gas_limit.to_bytes_be());
        update_var(&mut hasher, &self.time.to_bytes_be());
        update_var(&mut hasher, &self.extra);
        hasher.update(self.mix_digest);
        hasher.update(self.nonce);
        hasher.finalize().into()
    }
}

// Variable-width fields are length-prefixed so adjacent fields cannot alias.
fn update_var(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// A block as far as this crate is concerned: genesis blocks carry no
/// transactions or uncles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
}

impl Block {
    pub fn new(header: Header) -> Self {
        Block { header }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_hash_changes_with_fields() {
        let header = Header {
            number: 1_920_000,
            difficulty: BigUint::from(131_072u32),
            ..Default::default()
        };
        let mut other = header.clone();
        assert_eq!(header.hash(), other.hash());

        other.extra = vec![0x01];
        assert_ne!(header.hash(), other.hash());
    }

    #[test]
    fn test_variable_fields_do_not_alias() {
        let a = Header {
            gas_limit: BigUint::from(0x0102u32),
            time: BigUint::from(0x03u32),
            ..Default::default()
        };
        let b = Header {
            gas_limit: BigUint::from(0x01u32),
            time: BigUint::from(0x0203u32),
            ..Default::default()
        };
        assert_ne!(a.hash(), b.hash());
    }
}
