use super::chain::{Address, Hash};
use crate::error::{ChainError, Result};
use crate::persistence::Persistence;
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Root of a ledger holding no accounts.
pub const EMPTY_ROOT: Hash = [0u8; 32];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: BigUint,
    pub code: Vec<u8>,
    pub storage: BTreeMap<Hash, Hash>,
}

impl Account {
    pub fn code_hash(&self) -> Hash {
        Sha256::digest(&self.code).into()
    }
}

/// In-memory view of the account state, rooted at the state it was opened
/// from. Changes stay local until [`LedgerState::commit_batch`] hands out a
/// batch for the caller to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    accounts: BTreeMap<Address, Account>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the state stored under `root`. The empty root needs no lookup.
    pub fn open(store: &dyn Persistence, root: Hash) -> Result<Self> {
        if root == EMPTY_ROOT {
            return Ok(Self::new());
        }
        store
            .read_state(&root)?
            .ok_or_else(|| ChainError::DatabaseError(format!("missing state root {}", hex::encode(root))))
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = (Address, Account)>) -> Self {
        LedgerState {
            accounts: accounts.into_iter().collect(),
        }
    }

    pub fn add_balance(&mut self, address: Address, amount: &BigUint) {
        let account = self.accounts.entry(address).or_default();
        account.balance += amount;
    }

    pub fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.accounts.entry(address).or_default().code = code;
    }

    /// Sets a storage slot; a zero value clears it.
    pub fn set_state(&mut self, address: Address, key: Hash, value: Hash) {
        let storage = &mut self.accounts.entry(address).or_default().storage;
        if value == [0u8; 32] {
            storage.remove(&key);
        } else {
            storage.insert(key, value);
        }
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        self.accounts
            .get(address)
            .map(|a| a.balance.clone())
            .unwrap_or_else(BigUint::zero)
    }

    pub fn storage(&self, address: &Address, key: &Hash) -> Hash {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(key).copied())
            .unwrap_or([0u8; 32])
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Commitment over every account in address order.
    pub fn root(&self) -> Hash {
        if self.accounts.is_empty() {
            return EMPTY_ROOT;
        }
        let mut hasher = Sha256::new();
        for (address, account) in &self.accounts {
            let balance = account.balance.to_bytes_be();
            hasher.update(address);
            hasher.update((balance.len() as u64).to_be_bytes());
            hasher.update(&balance);
            hasher.update(account.code_hash());
            hasher.update((account.storage.len() as u64).to_be_bytes());
            for (key, value) in &account.storage {
                hasher.update(key);
                hasher.update(value);
            }
        }
        hasher.finalize().into()
    }

    /// Computes the root and a pending batch holding the state to persist.
    /// Nothing is durable until the batch is written.
    pub fn commit_batch(&self) -> (Hash, StateBatch) {
        let root = self.root();
        let batch = StateBatch {
            root,
            state: self.clone(),
        };
        (root, batch)
    }
}

/// State awaiting a durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBatch {
    root: Hash,
    state: LedgerState,
}

impl StateBatch {
    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn write(&self, store: &dyn Persistence) -> Result<()> {
        store.write_state(self)
    }
}
