//! Durable key-value persistence for blocks, transactions, and chain tip
//! metadata, backed by an embedded `sled` database.
//!
//! Key schema:
//! - `b:<be_u64 height>`      → serialized [`Block`]
//! - `h:<32-byte header hash>` → serialized [`Block`] (secondary index)
//! - `t:<32-byte tx hash>`     → serialized [`Transaction`]
//! - `latest_height`           → 8-byte little-endian `u64`
//! - `genesis`                 → serialized [`GenesisConfig`]
//!
//! `save_block` writes the `b:`/`h:` entries as a single atomic `sled`
//! transaction; `set_latest_height` is a separate write issued only after
//! `save_block` returns `Ok`.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionalTree};

use crate::block::Block;
use crate::genesis::GenesisConfig;
use crate::tx::Transaction;
use crate::{Error, Hash, Result};

const LATEST_HEIGHT_KEY: &[u8] = b"latest_height";
const GENESIS_KEY: &[u8] = b"genesis";

fn height_key(height: u64) -> Vec<u8> {
    let mut key = b"b:".to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn hash_key(hash: &Hash) -> Vec<u8> {
    let mut key = b"h:".to_vec();
    key.extend_from_slice(hash.as_ref());
    key
}

fn tx_key(hash: &Hash) -> Vec<u8> {
    let mut key = b"t:".to_vec();
    key.extend_from_slice(hash.as_ref());
    key
}

/// Durable block/transaction store plus chain-tip metadata.
pub struct Store {
    db: sled::Db,
}

impl Store {
    /// Opens (creating if absent) the `sled` database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store, useful for tests.
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Atomically writes `block` under both its height key and its header
    /// hash key, then writes each of its transactions under their tx-hash
    /// keys.
    pub fn save_block(&self, block: &Block) -> Result<()> {
        let height_k = height_key(block.header.height);
        let hash_k = hash_key(&block.header.hash());
        let bytes = serde_json::to_vec(block)?;

        self.db
            .transaction(|tx: &TransactionalTree| -> Result<(), ConflictableTransactionError<Error>> {
                tx.insert(height_k.as_slice(), bytes.as_slice())?;
                tx.insert(hash_k.as_slice(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(Error::from)?;

        for transaction in &block.transactions {
            self.save_transaction(transaction)?;
        }
        Ok(())
    }

    pub fn get_block(&self, height: u64) -> Result<Block> {
        let bytes = self.db.get(height_key(height))?.ok_or(Error::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Block> {
        let bytes = self.db.get(hash_key(hash))?.ok_or(Error::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let key = tx_key(&transaction.hash());
        let bytes = serde_json::to_vec(transaction)?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    pub fn get_transaction(&self, hash: &Hash) -> Result<Transaction> {
        let bytes = self.db.get(tx_key(hash))?.ok_or(Error::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Separate, later write: must only be called after `save_block`
    /// returns `Ok` for the corresponding block.
    pub fn set_latest_height(&self, height: u64) -> Result<()> {
        self.db.insert(LATEST_HEIGHT_KEY, &height.to_le_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Returns `0` if `latest_height` has never been written.
    pub fn latest_height(&self) -> Result<u64> {
        match self.db.get(LATEST_HEIGHT_KEY)? {
            None => Ok(0),
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| Error::Serialization("malformed latest_height record".into()))?;
                Ok(u64::from_le_bytes(arr))
            }
        }
    }

    pub fn save_genesis(&self, genesis: &GenesisConfig) -> Result<()> {
        let bytes = serde_json::to_vec(genesis)?;
        self.db.insert(GENESIS_KEY, bytes)?;
        Ok(())
    }

    pub fn get_genesis(&self) -> Result<GenesisConfig> {
        let bytes = self.db.get(GENESIS_KEY)?.ok_or(Error::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
