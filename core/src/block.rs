//! Block header and block records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tx::Transaction;
use crate::{Hash, PublicKey, Signature};

/// Metadata identifying a block.
///
/// `hash()` covers only `prev_block_hash ∥ tx_root ∥ state_root ∥ proposer`;
/// `height`, `timestamp` and `round` are deliberately **not** covered — this
/// is preserved for compatibility with the reference design, not a cut
/// corner, and a future revision is expected to widen the preimage to
/// include them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: i64,
    pub prev_block_hash: Hash,
    pub tx_root: Hash,
    pub state_root: Hash,
    pub proposer: PublicKey,
    pub round: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.prev_block_hash.as_ref());
        hasher.update(self.tx_root.as_ref());
        hasher.update(self.state_root.as_ref());
        hasher.update(self.proposer.as_ref());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }
}

/// A validator's signature over a block header hash for a given round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSignature {
    pub validator: PublicKey,
    pub signature: Signature,
    pub round: u32,
}

/// A finalized (or in-flight) block: header, ordered transactions, and the
/// validator signatures collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub validators: Vec<ValidatorSignature>,
}

/// Computes the transaction root: SHA-256 over SHA-256 of the concatenation
/// of every transaction hash, in order.
pub fn compute_tx_root(transactions: &[Transaction]) -> Hash {
    let mut inner = Sha256::new();
    for tx in transactions {
        inner.update(tx.hash().as_ref());
    }
    let first = inner.finalize();
    let mut outer = Sha256::new();
    outer.update(first);
    let digest = outer.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}
