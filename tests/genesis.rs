//! Integration tests for genesis materialization against real stores

use chainspec::blockchain::{Block, Hash, LedgerState, StateBatch};
use chainspec::genesis::{make_genesis_dump, read_genesis_from_json_file, write_genesis_block, GenesisDump};
use chainspec::persistence::{Database, InMemoryPersistence, Persistence};
use chainspec::{ChainError, Result};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const GENESIS_JSON: &str = r#"{
    "nonce": "0x0000000000000042",
    "timestamp": "0x00",
    "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
    "extraData": "0x",
    "gasLimit": "0x47E7C4",
    "difficulty": "0x020000",
    "mixhash": "0x0000000000000000000000000000000000000000000000000000000000000000",
    "coinbase": "0x0000000000000000000000000000000000000000",
    "alloc": {
        "dbdbdb2cbd23b783741e8d7fcf51e459b497e4a6": {
            "balance": "1606938044258990275541962092341162602522202993782792835301376"
        },
        "e6716f9544a56c530d868e4bfbacb172315bdead": {
            "code": "0x6060604052",
            "storage": {
                "0000000000000000000000000000000000000000000000000000000000000001": "00000000000000000000000000000000000000000000000000000000000000ff"
            },
            "balance": "0"
        }
    }
}"#;

fn dump() -> GenesisDump {
    serde_json::from_str(GENESIS_JSON).unwrap()
}

#[test]
fn test_sqlite_genesis_is_idempotent() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("chaindata.sqlite");
    let path = path.to_str().ok_or("non-utf8 temp path")?;

    let first = {
        let db = Database::open(path)?;
        write_genesis_block(&db, &dump())?
    };

    // Reopen to make sure everything was durable.
    let db = Database::open(path)?;
    let second = write_genesis_block(&db, &dump())?;
    assert_eq!(first, second);
    assert_eq!(db.get_canonical_hash(0)?, Some(first.hash()));
    assert_eq!(db.get_head_block_hash()?, Some(first.hash()));
    assert_eq!(db.get_td(&first.hash())?, Some(BigUint::from(0x020000u32)));

    let state = LedgerState::open(&db, first.header.root)?;
    assert_eq!(state.len(), 2);
    Ok(())
}

#[test]
fn test_dump_roundtrip_through_sqlite() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("chaindata.sqlite");
    let db = Database::open(path.to_str().ok_or("non-utf8 temp path")?)?;

    let block = write_genesis_block(&db, &dump())?;
    let dumped = make_genesis_dump(&db)?.ok_or("genesis missing")?;
    assert_eq!(dumped.alloc.len(), 2);

    let rebuilt = write_genesis_block(&InMemoryPersistence::new(), &dumped)?;
    assert_eq!(rebuilt.hash(), block.hash());
    Ok(())
}

#[test]
fn test_read_genesis_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("genesis.json");
    std::fs::write(&path, GENESIS_JSON)?;
    assert_eq!(read_genesis_from_json_file(&path)?, dump());

    assert!(matches!(
        read_genesis_from_json_file(dir.path().join("missing.json")),
        Err(ChainError::IoError(_))
    ));
    Ok(())
}

#[test]
fn test_malformed_storage_aborts_before_writes() {
    let mut bad = dump();
    for account in bad.alloc.values_mut() {
        if let Some(value) = account.storage.values_mut().next() {
            value.0.pop();
        }
    }
    let db = InMemoryPersistence::new();
    assert!(matches!(write_genesis_block(&db, &bad), Err(ChainError::MalformedHex { .. })));
    assert!(db.get_canonical_hash(0).unwrap().is_none());
    assert!(db.states.lock().unwrap().is_empty());
}

/// Store that fails its n-th write and records how many writes it saw.
struct FailingStore {
    inner: InMemoryPersistence,
    fail_at: usize,
    writes: AtomicUsize,
}

impl FailingStore {
    fn new(fail_at: usize) -> Self {
        Self {
            inner: InMemoryPersistence::new(),
            fail_at,
            writes: AtomicUsize::new(0),
        }
    }

    fn check(&self, step: &str) -> Result<()> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_at {
            return Err(ChainError::DatabaseError(format!("injected failure at {}", step)));
        }
        Ok(())
    }
}

impl Persistence for FailingStore {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        self.inner.get_block(hash)
    }
    fn write_block(&self, block: &Block) -> Result<()> {
        self.check("block")?;
        self.inner.write_block(block)
    }
    fn get_td(&self, hash: &Hash) -> Result<Option<BigUint>> {
        self.inner.get_td(hash)
    }
    fn write_td(&self, hash: &Hash, td: &BigUint) -> Result<()> {
        self.check("td")?;
        self.inner.write_td(hash, td)
    }
    fn get_receipts(&self, hash: &Hash) -> Result<Option<Vec<Vec<u8>>>> {
        self.inner.get_receipts(hash)
    }
    fn write_receipts(&self, hash: &Hash, receipts: &[Vec<u8>]) -> Result<()> {
        self.check("receipts")?;
        self.inner.write_receipts(hash, receipts)
    }
    fn get_canonical_hash(&self, number: u64) -> Result<Option<Hash>> {
        self.inner.get_canonical_hash(number)
    }
    fn write_canonical_hash(&self, hash: &Hash, number: u64) -> Result<()> {
        self.check("canonical")?;
        self.inner.write_canonical_hash(hash, number)
    }
    fn get_head_block_hash(&self) -> Result<Option<Hash>> {
        self.inner.get_head_block_hash()
    }
    fn write_head_block_hash(&self, hash: &Hash) -> Result<()> {
        self.check("head")?;
        self.inner.write_head_block_hash(hash)
    }
    fn read_state(&self, root: &Hash) -> Result<Option<LedgerState>> {
        self.inner.read_state(root)
    }
    fn write_state(&self, batch: &StateBatch) -> Result<()> {
        self.check("state")?;
        self.inner.write_state(batch)
    }
}

#[test]
fn test_write_failure_aborts_remaining_steps() {
    // Writes happen as: state, td, block, receipts, canonical, head.
    for fail_at in 0..6 {
        let store = FailingStore::new(fail_at);
        let err = write_genesis_block(&store, &dump()).unwrap_err();
        assert!(err.to_string().starts_with("Database error: injected failure at "));
        assert!(matches!(err, ChainError::DatabaseError(_)));
        // The store's error comes back unwrapped.
        assert_eq!(err.to_string().matches("Database error").count(), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), fail_at + 1);
        assert!(store.inner.get_head_block_hash().unwrap().is_none());
    }

    let store = FailingStore::new(usize::MAX);
    write_genesis_block(&store, &dump()).unwrap();
    assert_eq!(store.writes.load(Ordering::SeqCst), 6);
}

#[test]
fn test_failure_leaves_earlier_writes_in_place() {
    // Failing at the block write leaves state and td behind.
    let store = FailingStore::new(2);
    assert!(write_genesis_block(&store, &dump()).is_err());
    assert_eq!(store.inner.states.lock().unwrap().len(), 1);
    assert_eq!(store.inner.total_difficulty.lock().unwrap().len(), 1);
    assert!(store.inner.blocks.lock().unwrap().is_empty());
}
