//! Genesis dump format and the one-time construction of block zero
//!
//! [`write_genesis_block`] builds the initial account state from a
//! [`GenesisDump`], derives the genesis header from it and persists both. A
//! store that already holds the same genesis block is left untouched apart
//! from its canonical pointer.

use crate::blockchain::{Address, Block, Hash, Header, LedgerState, EMPTY_ROOT};
use crate::codec::{parse_big_uint, HexString, PrefixedHex};
use crate::error::{ChainError, HexError, Result};
use crate::persistence::Persistence;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Genesis in the geth JSON genesis file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisDump {
    #[serde(default)]
    pub nonce: PrefixedHex,
    #[serde(default)]
    pub timestamp: PrefixedHex,
    #[serde(default)]
    pub parent_hash: PrefixedHex,
    #[serde(default)]
    pub extra_data: PrefixedHex,
    #[serde(default)]
    pub gas_limit: PrefixedHex,
    #[serde(default)]
    pub difficulty: PrefixedHex,
    #[serde(default)]
    pub mixhash: PrefixedHex,
    #[serde(default)]
    pub coinbase: PrefixedHex,

    /// Accounts by their bare hex address.
    #[serde(default)]
    pub alloc: BTreeMap<HexString, GenesisAlloc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAlloc {
    #[serde(default)]
    pub code: PrefixedHex,
    #[serde(default)]
    pub storage: BTreeMap<HexString, HexString>,
    /// Decimal string.
    #[serde(default)]
    pub balance: String,
}

fn malformed(field: impl Into<String>) -> impl FnOnce(HexError) -> ChainError {
    let field = field.into();
    move |source| ChainError::MalformedHex { field, source }
}

impl GenesisDump {
    /// Decodes the header fields of the dump. The state root is left empty.
    pub fn header(&self) -> Result<Header> {
        Ok(Header {
            nonce: self.nonce.decode_array().map_err(malformed("nonce"))?,
            time: self.timestamp.to_big_uint().map_err(malformed("timestamp"))?,
            parent_hash: self.parent_hash.decode_array().map_err(malformed("parentHash"))?,
            extra: self.extra_data.to_bytes().map_err(malformed("extraData"))?,
            gas_limit: self.gas_limit.to_big_uint().map_err(malformed("gasLimit"))?,
            difficulty: self.difficulty.to_big_uint().map_err(malformed("difficulty"))?,
            mix_digest: self.mixhash.decode_array().map_err(malformed("mixhash"))?,
            coinbase: self.coinbase.decode_array().map_err(malformed("coinbase"))?,
            root: EMPTY_ROOT,
            number: 0,
        })
    }

    /// Builds the account state described by `alloc` on top of `state`.
    pub fn apply_alloc(&self, state: &mut LedgerState) -> Result<()> {
        for (addr_hex, account) in &self.alloc {
            let address: Address = addr_hex
                .decode_array()
                .map_err(malformed(format!("address {:?}", addr_hex.as_str())))?;

            let balance = parse_big_uint(&account.balance).ok_or_else(|| {
                ChainError::InvalidGenesis(format!(
                    "malformed account {:?} balance {:?}",
                    addr_hex.as_str(),
                    account.balance
                ))
            })?;
            state.add_balance(address, &balance);

            let code = account
                .code
                .to_bytes()
                .map_err(malformed(format!("account {:?} code", addr_hex.as_str())))?;
            state.set_code(address, code);

            for (key, value) in &account.storage {
                let k: Hash = key
                    .decode_array()
                    .map_err(malformed(format!("account {:?} key", addr_hex.as_str())))?;
                let v: Hash = value
                    .decode_array()
                    .map_err(malformed(format!("account {:?} value", addr_hex.as_str())))?;
                state.set_state(address, k, v);
            }
        }
        Ok(())
    }
}

/// Writes the genesis block to the database as block number 0.
///
/// When a block with the resulting hash is already stored only the canonical
/// pointer for height 0 is rewritten and the stored block is returned.
/// Otherwise the state, total difficulty, block, (empty) receipts, canonical
/// pointer and head pointer are written in that order. A failing step aborts
/// without undoing earlier writes.
pub fn write_genesis_block(db: &dyn Persistence, genesis: &GenesisDump) -> Result<Block> {
    let mut state = LedgerState::open(db, EMPTY_ROOT)?;
    genesis.apply_alloc(&mut state)?;
    let (root, state_batch) = state.commit_batch();

    let mut header = genesis.header()?;
    header.root = root;

    let block = Block::new(header);
    let hash = block.hash();

    if let Some(existing) = db.get_block(&hash)? {
        info!(hash = %hex::encode(hash), "Genesis block already in chain. Writing canonical number");
        db.write_canonical_hash(&hash, existing.number())?;
        return Ok(existing);
    }

    state_batch.write(db)?;
    db.write_td(&hash, &block.header.difficulty)?;
    db.write_block(&block)?;
    db.write_receipts(&hash, &[])?;
    db.write_canonical_hash(&hash, block.number())?;
    db.write_head_block_hash(&hash)?;

    info!(
        hash = %hex::encode(hash),
        root = %hex::encode(root),
        accounts = state.len(),
        "Wrote genesis block"
    );
    Ok(block)
}

/// Rebuilds a genesis dump from the canonical block 0 of `db` and its state.
/// Returns `None` when the store holds no genesis block.
pub fn make_genesis_dump(db: &dyn Persistence) -> Result<Option<GenesisDump>> {
    let Some(hash) = db.get_canonical_hash(0)? else {
        return Ok(None);
    };
    let Some(genesis) = db.get_block(&hash)? else {
        return Ok(None);
    };
    let header = &genesis.header;

    let mut dump = GenesisDump {
        nonce: PrefixedHex::encode(&header.nonce),
        timestamp: PrefixedHex::encode(&big_to_hash(&header.time)),
        parent_hash: PrefixedHex::encode(&header.parent_hash),
        extra_data: PrefixedHex::encode(&header.extra),
        gas_limit: PrefixedHex::encode(&big_to_hash(&header.gas_limit)),
        difficulty: PrefixedHex::encode(&big_to_hash(&header.difficulty)),
        mixhash: PrefixedHex::encode(&header.mix_digest),
        coinbase: PrefixedHex::encode(&header.coinbase),
        alloc: BTreeMap::new(),
    };

    let state = LedgerState::open(db, header.root)?;
    for (address, account) in state.accounts() {
        dump.alloc.insert(
            HexString::encode(address),
            GenesisAlloc {
                code: if account.code.is_empty() {
                    PrefixedHex::default()
                } else {
                    PrefixedHex::encode(&account.code)
                },
                storage: account
                    .storage
                    .iter()
                    .map(|(k, v)| (HexString::encode(k), HexString::encode(v)))
                    .collect(),
                balance: account.balance.to_string(),
            },
        );
    }
    debug!(accounts = dump.alloc.len(), "Dumped genesis state");
    Ok(Some(dump))
}

/// Left-pads (or truncates to the low 32 bytes) a big integer into a hash.
fn big_to_hash(value: &BigUint) -> Hash {
    let bytes = value.to_bytes_be();
    let mut hash = [0u8; 32];
    let take = bytes.len().min(32);
    hash[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    hash
}

/// Reads a genesis dump from a JSON file. No checks are made on the path.
pub fn read_genesis_from_json_file(path: impl AsRef<Path>) -> Result<GenesisDump> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| ChainError::IoError(format!("failed to read genesis file: {}", e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ChainError::Json(format!("{}: {}", path.display(), e)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: BigUint,
}

/// Writes a minimal genesis funding `accounts`, for tests and dev chains.
pub fn write_genesis_block_for_testing(db: &dyn Persistence, accounts: &[GenesisAccount]) -> Result<Block> {
    let dump = GenesisDump {
        gas_limit: PrefixedHex::from("0x47E7C4"),
        difficulty: PrefixedHex::from("0x020000"),
        alloc: accounts
            .iter()
            .map(|a| {
                (
                    HexString::encode(&a.address),
                    GenesisAlloc {
                        balance: a.balance.to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect(),
        ..Default::default()
    };
    write_genesis_block(db, &dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;

    const ADDR: &str = "3282791d6fd713f1e94f4bfd565eaa78b3a0599d";

    fn dump() -> GenesisDump {
        let mut alloc = BTreeMap::new();
        alloc.insert(
            HexString::from(ADDR),
            GenesisAlloc {
                code: PrefixedHex::from("0x6001"),
                storage: [(
                    HexString::new("01".repeat(32)),
                    HexString::new("02".repeat(32)),
                )]
                .into_iter()
                .collect(),
                balance: "1337000000000000000000".to_string(),
            },
        );
        GenesisDump {
            nonce: PrefixedHex::from("0x0000000000000042"),
            timestamp: PrefixedHex::from("0x00"),
            parent_hash: PrefixedHex::new(format!("0x{}", "00".repeat(32))),
            extra_data: PrefixedHex::from("0x11bbe8db4e347b4e8c937c1c8370e4b5ed33adb3db69cbdb7a38e1e50b1b82fa"),
            gas_limit: PrefixedHex::from("0x1388"),
            difficulty: PrefixedHex::from("0x0400000000"),
            mixhash: PrefixedHex::new(format!("0x{}", "00".repeat(32))),
            coinbase: PrefixedHex::new(format!("0x{}", "00".repeat(20))),
            alloc,
        }
    }

    #[test]
    fn test_header_decoding() {
        let header = dump().header().unwrap();
        assert_eq!(header.nonce, [0, 0, 0, 0, 0, 0, 0, 0x42]);
        assert_eq!(header.gas_limit, BigUint::from(5000u32));
        assert_eq!(header.difficulty, BigUint::from(17_179_869_184u64));
        assert_eq!(header.extra.len(), 32);
        assert_eq!(header.number, 0);
    }

    #[test]
    fn test_header_empty_fields_are_zero() {
        let header = GenesisDump::default().header().unwrap();
        assert_eq!(header, Header::default());
    }

    #[test]
    fn test_malformed_nonce_names_field() {
        let mut bad = dump();
        bad.nonce = PrefixedHex::from("0x42");
        let err = bad.header().unwrap_err();
        assert_eq!(err.to_string(), "malformed nonce: want 16 hexadecimals with 0x prefix");
    }

    #[test]
    fn test_write_genesis_populates_store() {
        let db = InMemoryPersistence::new();
        let block = write_genesis_block(&db, &dump()).unwrap();
        let hash = block.hash();

        assert_eq!(db.get_canonical_hash(0).unwrap(), Some(hash));
        assert_eq!(db.get_head_block_hash().unwrap(), Some(hash));
        assert_eq!(db.get_td(&hash).unwrap(), Some(BigUint::from(17_179_869_184u64)));
        assert_eq!(db.get_receipts(&hash).unwrap(), Some(vec![]));

        let state = LedgerState::open(&db, block.header.root).unwrap();
        let addr: Address = HexString::from(ADDR).decode_array().unwrap();
        assert_eq!(state.balance(&addr), "1337000000000000000000".parse::<BigUint>().unwrap());
        assert_eq!(state.account(&addr).unwrap().code, vec![0x60, 0x01]);
        assert_eq!(state.storage(&addr, &[1; 32]), [2; 32]);
    }

    #[test]
    fn test_write_genesis_is_idempotent() {
        let db = InMemoryPersistence::new();
        let first = write_genesis_block(&db, &dump()).unwrap();
        let second = write_genesis_block(&db, &dump()).unwrap();
        assert_eq!(first, second);
        assert_eq!(db.blocks.lock().unwrap().len(), 1);
        assert_eq!(db.states.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_existing_genesis_rewrites_canonical_only() {
        let db = InMemoryPersistence::new();
        let block = write_genesis_block(&db, &dump()).unwrap();
        db.write_canonical_hash(&[0xee; 32], 0).unwrap();
        db.states.lock().unwrap().clear();

        write_genesis_block(&db, &dump()).unwrap();
        assert_eq!(db.get_canonical_hash(0).unwrap(), Some(block.hash()));
        assert!(db.states.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_balance_is_rejected() {
        let mut bad = dump();
        bad.alloc.values_mut().for_each(|a| a.balance = "lots".to_string());
        let db = InMemoryPersistence::new();
        assert!(matches!(write_genesis_block(&db, &bad), Err(ChainError::InvalidGenesis(_))));
        assert!(db.blocks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let mut bad = dump();
        let alloc = bad.alloc.remove(&HexString::from(ADDR)).unwrap();
        bad.alloc.insert(HexString::from("3282791d"), alloc);
        let db = InMemoryPersistence::new();
        match write_genesis_block(&db, &bad) {
            Err(ChainError::MalformedHex { field, source }) => {
                assert!(field.contains("3282791d"));
                assert_eq!(source, HexError::Length { want: 40 });
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_make_genesis_dump_reproduces_block() {
        let db = InMemoryPersistence::new();
        assert!(make_genesis_dump(&db).unwrap().is_none());

        let block = write_genesis_block(&db, &dump()).unwrap();
        let dumped = make_genesis_dump(&db).unwrap().unwrap();
        assert_eq!(dumped.alloc.len(), 1);

        let fresh = InMemoryPersistence::new();
        let rebuilt = write_genesis_block(&fresh, &dumped).unwrap();
        assert_eq!(rebuilt.hash(), block.hash());
    }

    #[test]
    fn test_genesis_for_testing() {
        let db = InMemoryPersistence::new();
        let account = GenesisAccount {
            address: [0x42; 20],
            balance: BigUint::from(1_000u32),
        };
        let block = write_genesis_block_for_testing(&db, &[account]).unwrap();
        assert_eq!(block.header.gas_limit, BigUint::from(0x47E7C4u32));
        assert_eq!(block.header.difficulty, BigUint::from(0x020000u32));

        let state = LedgerState::open(&db, block.header.root).unwrap();
        assert_eq!(state.balance(&[0x42; 20]), BigUint::from(1_000u32));
    }

    #[test]
    fn test_big_to_hash_pads_left() {
        let hash = big_to_hash(&BigUint::from(0x0102u32));
        assert_eq!(&hash[30..], &[0x01, 0x02]);
        assert!(hash[..30].iter().all(|b| *b == 0));
    }
}
