//! UTXO ledger state for **Obscura**.
//!
//! The ledger tracks the set of unspent outputs, the set of spent key
//! images, the validator registry, and the current height. It is **not**
//! thread-safe by itself — callers (the node orchestrator) must wrap it in
//! a `parking_lot::RwLock` if concurrent access is required; readers take
//! the read lock, mutators take the write lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::block::Block;
use crate::tx::Transaction;
use crate::{Error, Hash, PublicKey, Result, TxOutput};

pub type UtxoKey = (Hash, u32);

/// An unspent (or formerly-unspent) transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: Hash,
    pub output_index: u32,
    pub output: TxOutput,
    pub block_height: u64,
    pub spent: bool,
}

/// A validator's bonded stake and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorState {
    pub public_key: PublicKey,
    pub staked_amount: u64,
    pub active: bool,
    pub joined_height: u64,
    pub unbonding_until: u64,
    pub slash_count: u32,
}

/// In-memory UTXO set, spent-key-image set, validator registry, and chain
/// height.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub utxos: HashMap<UtxoKey, Utxo>,
    pub spent_key_images: HashSet<PublicKey>,
    pub validators: BTreeMap<PublicKey, ValidatorState>,
    pub height: u64,
    pub total_supply: u64,
}

impl Ledger {
    /// An empty ledger at height 0, ready to have a genesis configuration
    /// (and then block 1) applied to it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger's validator registry and supply from a genesis
    /// configuration. Must be called before any block is applied.
    pub fn apply_genesis(&mut self, initial_supply: u64, initial_validators: &[ValidatorState]) -> Result<()> {
        self.total_supply = initial_supply;
        for v in initial_validators {
            self.add_validator(v.public_key, v.staked_amount, v.joined_height)?;
        }
        Ok(())
    }

    /// Validates `tx` against current state without mutating it.
    /// Ring-signature arithmetic is checked by the consensus engine before
    /// this is called.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        for input in &tx.inputs {
            if self.spent_key_images.contains(&input.key_image) {
                return Err(Error::DoubleSpend);
            }
        }
        if tx.ring_signature.is_none() {
            return Err(Error::MissingRingSignature);
        }
        if tx.input_total() != tx.output_total() + tx.fee {
            return Err(Error::UnbalancedAmounts);
        }
        Ok(())
    }

    /// Applies `tx` at `block_height`: re-checks double-spend, records
    /// every input's key image as spent, and inserts the produced outputs
    /// as new UTXOs.
    pub fn apply_transaction(&mut self, tx: &Transaction, block_height: u64) -> Result<()> {
        let mut spent = Vec::new();
        let mut created = Vec::new();
        let result = self.apply_transaction_tracked(tx, block_height, &mut spent, &mut created);
        if result.is_err() {
            self.rollback(&spent, &created);
        }
        result
    }

    fn apply_transaction_tracked(
        &mut self,
        tx: &Transaction,
        block_height: u64,
        applied_key_images: &mut Vec<PublicKey>,
        applied_utxo_keys: &mut Vec<UtxoKey>,
    ) -> Result<()> {
        self.validate_transaction(tx)?;
        for input in &tx.inputs {
            self.spent_key_images.insert(input.key_image);
            applied_key_images.push(input.key_image);
        }
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            let key = (tx_hash, index as u32);
            self.utxos.insert(
                key,
                Utxo {
                    tx_hash,
                    output_index: index as u32,
                    output: output.clone(),
                    block_height,
                    spent: false,
                },
            );
            applied_utxo_keys.push(key);
        }
        Ok(())
    }

    fn rollback(&mut self, key_images: &[PublicKey], utxo_keys: &[UtxoKey]) {
        for ki in key_images {
            self.spent_key_images.remove(ki);
        }
        for key in utxo_keys {
            self.utxos.remove(key);
        }
    }

    /// Applies every transaction in `block` in order. On any transaction
    /// failure the whole block application fails and the ledger is left
    /// exactly as it was (snapshot-and-restore rollback).
    /// On success, advances `height` to `block.header.height`.
    pub fn apply_block(&mut self, block: &Block) -> Result<()> {
        let expected = self.height + 1;
        if block.header.height != expected {
            return Err(Error::InvalidHeight {
                expected,
                got: block.header.height,
            });
        }

        let mut spent_key_images = Vec::new();
        let mut created_utxo_keys = Vec::new();
        for tx in &block.transactions {
            if let Err(e) =
                self.apply_transaction_tracked(tx, block.header.height, &mut spent_key_images, &mut created_utxo_keys)
            {
                self.rollback(&spent_key_images, &created_utxo_keys);
                return Err(e);
            }
        }
        self.height = block.header.height;
        Ok(())
    }

    /// SHA-256 over SHA-256 of the concatenation of every UTXO map key, in
    /// whatever order the underlying `HashMap` iterates them. Iteration
    /// order is unspecified, so this is **not** deterministic across
    /// implementations, or even across two runs of this one — an
    /// intentional preservation of the reference design.
    pub fn compute_state_root(&self) -> Hash {
        let mut inner = Sha256::new();
        for (tx_hash, index) in self.utxos.keys() {
            inner.update(tx_hash.as_ref());
            inner.update(index.to_be_bytes());
        }
        let first = inner.finalize();
        let mut outer = Sha256::new();
        outer.update(first);
        let digest = outer.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    pub fn get_utxo(&self, key: &UtxoKey) -> Option<&Utxo> {
        self.utxos.get(key)
    }

    /// Registers a new validator. Fails if the key is already registered.
    pub fn add_validator(&mut self, public_key: PublicKey, stake: u64, joined_height: u64) -> Result<()> {
        if self.validators.contains_key(&public_key) {
            return Err(Error::ValidatorExists(public_key));
        }
        self.validators.insert(
            public_key,
            ValidatorState {
                public_key,
                staked_amount: stake,
                active: true,
                joined_height,
                unbonding_until: 0,
                slash_count: 0,
            },
        );
        Ok(())
    }

    /// Applies an in-place mutation to a registered validator (used for
    /// slashing and unbonding).
    pub fn update_validator<F>(&mut self, public_key: &PublicKey, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut ValidatorState),
    {
        let entry = self.validators.get_mut(public_key).ok_or(Error::UnknownValidator)?;
        mutator(entry);
        Ok(())
    }

    pub fn get_validator(&self, public_key: &PublicKey) -> Option<&ValidatorState> {
        self.validators.get(public_key)
    }

    /// Every validator with `active == true`, in canonical ascending
    /// public-key order — free here because `validators` is a `BTreeMap`.
    pub fn get_active_validators(&self) -> Vec<ValidatorState> {
        self.validators.values().filter(|v| v.active).cloned().collect()
    }

    /// Total stake held by active validators.
    pub fn total_active_stake(&self) -> u64 {
        self.get_active_validators().iter().map(|v| v.staked_amount).sum()
    }
}
