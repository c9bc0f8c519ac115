//! Database persistence layer for chain data and account state

use crate::blockchain::{Account, Address, Block, Hash, LedgerState, StateBatch};
use crate::error::{ChainError, Result};
use num_bigint::BigUint;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage backend for blocks, chain pointers and committed account state.
/// Writes are individually durable; callers sequence them.
pub trait Persistence: Send + Sync {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>>;
    fn write_block(&self, block: &Block) -> Result<()>;
    fn get_td(&self, hash: &Hash) -> Result<Option<BigUint>>;
    fn write_td(&self, hash: &Hash, td: &BigUint) -> Result<()>;
    fn get_receipts(&self, hash: &Hash) -> Result<Option<Vec<Vec<u8>>>>;
    fn write_receipts(&self, hash: &Hash, receipts: &[Vec<u8>]) -> Result<()>;
    fn get_canonical_hash(&self, number: u64) -> Result<Option<Hash>>;
    fn write_canonical_hash(&self, hash: &Hash, number: u64) -> Result<()>;
    fn get_head_block_hash(&self) -> Result<Option<Hash>>;
    fn write_head_block_hash(&self, hash: &Hash) -> Result<()>;
    fn read_state(&self, root: &Hash) -> Result<Option<LedgerState>>;
    fn write_state(&self, batch: &StateBatch) -> Result<()>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

const HEAD_BLOCK_KEY: &str = "head_block";

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database {}: {}", path, e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                hash BLOB PRIMARY KEY,
                number INTEGER NOT NULL,
                header TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS total_difficulty (
                hash BLOB PRIMARY KEY,
                td TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS receipts (
                hash BLOB PRIMARY KEY,
                receipts TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS canonical (
                number INTEGER PRIMARY KEY,
                hash BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS state_roots (
                root BLOB PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS state_accounts (
                root BLOB NOT NULL,
                address BLOB NOT NULL,
                account TEXT NOT NULL,
                PRIMARY KEY (root, address)
            );",
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create tables: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

impl Persistence for Database {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        let conn = self.conn()?;
        let header_json: Option<String> = conn
            .query_row("SELECT header FROM blocks WHERE hash = ?1", params![hash.to_vec()], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read block: {}", e)))?;

        header_json
            .map(|json| {
                let header = serde_json::from_str(&json)
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to deserialize header: {}", e)))?;
                Ok(Block::new(header))
            })
            .transpose()
    }

    fn write_block(&self, block: &Block) -> Result<()> {
        let header_json = serde_json::to_string(&block.header)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to serialize header: {}", e)))?;

        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO blocks (hash, number, header) VALUES (?1, ?2, ?3)",
                params![block.hash().to_vec(), block.number() as i64, header_json],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;
        Ok(())
    }

    fn get_td(&self, hash: &Hash) -> Result<Option<BigUint>> {
        let conn = self.conn()?;
        let td: Option<String> = conn
            .query_row(
                "SELECT td FROM total_difficulty WHERE hash = ?1",
                params![hash.to_vec()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read total difficulty: {}", e)))?;

        td.map(|s| {
            s.parse::<BigUint>()
                .map_err(|e| ChainError::DatabaseError(format!("Corrupt total difficulty {:?}: {}", s, e)))
        })
        .transpose()
    }

    fn write_td(&self, hash: &Hash, td: &BigUint) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO total_difficulty (hash, td) VALUES (?1, ?2)",
                params![hash.to_vec(), td.to_string()],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save total difficulty: {}", e)))?;
        Ok(())
    }

    fn get_receipts(&self, hash: &Hash) -> Result<Option<Vec<Vec<u8>>>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row("SELECT receipts FROM receipts WHERE hash = ?1", params![hash.to_vec()], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read receipts: {}", e)))?;

        json.map(|json| {
            let encoded: Vec<String> = serde_json::from_str(&json)
                .map_err(|e| ChainError::DatabaseError(format!("Failed to deserialize receipts: {}", e)))?;
            encoded
                .iter()
                .map(|r| hex::decode(r).map_err(|e| ChainError::DatabaseError(format!("Corrupt receipt: {}", e))))
                .collect()
        })
        .transpose()
    }

    fn write_receipts(&self, hash: &Hash, receipts: &[Vec<u8>]) -> Result<()> {
        let encoded: Vec<String> = receipts.iter().map(hex::encode).collect();
        let json = serde_json::to_string(&encoded)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to serialize receipts: {}", e)))?;

        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO receipts (hash, receipts) VALUES (?1, ?2)",
                params![hash.to_vec(), json],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save receipts: {}", e)))?;
        Ok(())
    }

    fn get_canonical_hash(&self, number: u64) -> Result<Option<Hash>> {
        let conn = self.conn()?;
        let hash: Option<Vec<u8>> = conn
            .query_row("SELECT hash FROM canonical WHERE number = ?1", params![number as i64], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read canonical hash: {}", e)))?;
        hash.map(|h| to_hash(&h)).transpose()
    }

    fn write_canonical_hash(&self, hash: &Hash, number: u64) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO canonical (number, hash) VALUES (?1, ?2)",
                params![number as i64, hash.to_vec()],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save canonical hash: {}", e)))?;
        Ok(())
    }

    fn get_head_block_hash(&self) -> Result<Option<Hash>> {
        let conn = self.conn()?;
        let hash: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![HEAD_BLOCK_KEY], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read head block hash: {}", e)))?;
        hash.map(|h| to_hash(&h)).transpose()
    }

    fn write_head_block_hash(&self, hash: &Hash) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![HEAD_BLOCK_KEY, hash.to_vec()],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save head block hash: {}", e)))?;
        Ok(())
    }

    fn read_state(&self, root: &Hash) -> Result<Option<LedgerState>> {
        let conn = self.conn()?;
        let known: Option<i64> = conn
            .query_row("SELECT 1 FROM state_roots WHERE root = ?1", params![root.to_vec()], |row| row.get(0))
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to read state root: {}", e)))?;
        if known.is_none() {
            return Ok(None);
        }

        let mut stmt = conn
            .prepare("SELECT address, account FROM state_accounts WHERE root = ?1")
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params![root.to_vec()], |row| {
                let address: Vec<u8> = row.get(0)?;
                let account: String = row.get(1)?;
                Ok((address, account))
            })
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query state: {}", e)))?;

        let mut accounts = Vec::new();
        for row in rows {
            let (address_bytes, account_json) =
                row.map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))?;
            let address: Address = address_bytes
                .as_slice()
                .try_into()
                .map_err(|_| ChainError::DatabaseError(format!("Corrupt address {}", hex::encode(&address_bytes))))?;
            let stored: StoredAccount = serde_json::from_str(&account_json)
                .map_err(|e| ChainError::DatabaseError(format!("Failed to deserialize account: {}", e)))?;
            accounts.push((address, stored.into_account()?));
        }

        Ok(Some(LedgerState::from_accounts(accounts)))
    }

    fn write_state(&self, batch: &StateBatch) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        let root = batch.root().to_vec();
        tx.execute("INSERT OR REPLACE INTO state_roots (root) VALUES (?1)", params![root])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save state root: {}", e)))?;

        for (address, account) in batch.state().accounts() {
            let account_json = serde_json::to_string(&StoredAccount::from(account))
                .map_err(|e| ChainError::DatabaseError(format!("Failed to serialize account: {}", e)))?;
            tx.execute(
                "INSERT OR REPLACE INTO state_accounts (root, address, account) VALUES (?1, ?2, ?3)",
                params![root, address.to_vec(), account_json],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save account: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }
}

fn to_hash(bytes: &[u8]) -> Result<Hash> {
    bytes
        .try_into()
        .map_err(|_| ChainError::DatabaseError(format!("Corrupt hash {}", hex::encode(bytes))))
}

/// Account row as stored in SQLite: hex strings keep the JSON readable.
#[derive(Serialize, Deserialize)]
struct StoredAccount {
    balance: String,
    code: String,
    storage: BTreeMap<String, String>,
}

impl From<&Account> for StoredAccount {
    fn from(account: &Account) -> Self {
        StoredAccount {
            balance: account.balance.to_string(),
            code: hex::encode(&account.code),
            storage: account
                .storage
                .iter()
                .map(|(k, v)| (hex::encode(k), hex::encode(v)))
                .collect(),
        }
    }
}

impl StoredAccount {
    fn into_account(self) -> Result<Account> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| ChainError::DatabaseError(format!("Corrupt account {}: {}", what, e));
        let balance = self.balance.parse::<BigUint>().map_err(|e| corrupt("balance", &e))?;
        let code = hex::decode(&self.code).map_err(|e| corrupt("code", &e))?;
        let mut storage = BTreeMap::new();
        for (k, v) in &self.storage {
            let mut key = [0u8; 32];
            let mut value = [0u8; 32];
            hex::decode_to_slice(k, &mut key).map_err(|e| corrupt("storage key", &e))?;
            hex::decode_to_slice(v, &mut value).map_err(|e| corrupt("storage value", &e))?;
            storage.insert(key, value);
        }
        Ok(Account { balance, code, storage })
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same underlying tables.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: Arc<Mutex<HashMap<Hash, Block>>>,
    pub total_difficulty: Arc<Mutex<HashMap<Hash, BigUint>>>,
    pub receipts: Arc<Mutex<HashMap<Hash, Vec<Vec<u8>>>>>,
    pub canonical: Arc<Mutex<HashMap<u64, Hash>>>,
    pub head_block: Arc<Mutex<Option<Hash>>>,
    pub states: Arc<Mutex<HashMap<Hash, LedgerState>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
}

impl Persistence for InMemoryPersistence {
    fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        Ok(lock(&self.blocks)?.get(hash).cloned())
    }

    fn write_block(&self, block: &Block) -> Result<()> {
        lock(&self.blocks)?.insert(block.hash(), block.clone());
        Ok(())
    }

    fn get_td(&self, hash: &Hash) -> Result<Option<BigUint>> {
        Ok(lock(&self.total_difficulty)?.get(hash).cloned())
    }

    fn write_td(&self, hash: &Hash, td: &BigUint) -> Result<()> {
        lock(&self.total_difficulty)?.insert(*hash, td.clone());
        Ok(())
    }

    fn get_receipts(&self, hash: &Hash) -> Result<Option<Vec<Vec<u8>>>> {
        Ok(lock(&self.receipts)?.get(hash).cloned())
    }

    fn write_receipts(&self, hash: &Hash, receipts: &[Vec<u8>]) -> Result<()> {
        lock(&self.receipts)?.insert(*hash, receipts.to_vec());
        Ok(())
    }

    fn get_canonical_hash(&self, number: u64) -> Result<Option<Hash>> {
        Ok(lock(&self.canonical)?.get(&number).copied())
    }

    fn write_canonical_hash(&self, hash: &Hash, number: u64) -> Result<()> {
        lock(&self.canonical)?.insert(number, *hash);
        Ok(())
    }

    fn get_head_block_hash(&self) -> Result<Option<Hash>> {
        Ok(*lock(&self.head_block)?)
    }

    fn write_head_block_hash(&self, hash: &Hash) -> Result<()> {
        *lock(&self.head_block)? = Some(*hash);
        Ok(())
    }

    fn read_state(&self, root: &Hash) -> Result<Option<LedgerState>> {
        Ok(lock(&self.states)?.get(root).cloned())
    }

    fn write_state(&self, batch: &StateBatch) -> Result<()> {
        lock(&self.states)?.insert(batch.root(), batch.state().clone());
        Ok(())
    }
}
