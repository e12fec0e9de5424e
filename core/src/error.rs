//! Error types for the **Obscura** core crate.
//!
//! All fallible core operations return [`crate::Result`]. The variants map
//! directly onto the error kinds the node's propagation policy cares about:
//! validation errors are dropped-and-logged, consensus errors may trigger
//! slashing, persistence write errors are fatal to block application, and
//! resource errors signal the caller should stop rather than retry.
//!
//! # Examples
//!
//! ```
//! use obscura_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::DoubleSpend)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use crate::PublicKey;
use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    // --- Validation ---
    /// Structurally malformed transaction (e.g. wrong ring length).
    #[error("malformed transaction: {0}")]
    MalformedTransaction(&'static str),

    /// Attempted to spend a key image already recorded as spent.
    #[error("key image already spent")]
    DoubleSpend,

    /// Transaction carries no ring signature.
    #[error("missing ring signature")]
    MissingRingSignature,

    /// Ring signature failed structural verification.
    #[error("ring signature verification failed")]
    InvalidRingSignature,

    /// Sum of input amounts does not equal sum of output amounts plus fee.
    #[error("sum of inputs does not equal sum of outputs plus fee")]
    UnbalancedAmounts,

    /// Block height is not exactly one greater than the ledger's height.
    #[error("block height {got} is not the expected {expected}")]
    InvalidHeight { expected: u64, got: u64 },

    /// `prev_block_hash` does not match the chain tip.
    #[error("block previous hash does not match chain tip")]
    PrevHashMismatch,

    /// Block's proposer field does not match the deterministically selected
    /// proposer for its (height, round).
    #[error("block proposer does not match the selected proposer")]
    InvalidProposer { expected: PublicKey, got: PublicKey },

    /// Block timestamp is too far in the future to be accepted.
    #[error("block timestamp is too far in the future")]
    FutureTimestamp,

    /// A stealth output did not belong to the wallet attempting to spend it.
    #[error("output does not belong to this wallet")]
    NotWalletOutput,

    // --- Consensus ---
    /// A validator signed two different block hashes at the same round.
    #[error("duplicate vote from validator at same round for a different block")]
    DuplicateVote,

    /// Vote came from a public key not present in the validator set.
    #[error("vote from unknown validator")]
    UnknownValidator,

    /// Vote came from a validator marked inactive.
    #[error("vote from inactive validator")]
    InactiveValidator,

    /// `AddValidator` called with a key already present in the registry.
    #[error("validator {0} already registered")]
    ValidatorExists(PublicKey),

    /// No active validators with positive stake; consensus cannot proceed.
    #[error("no active validators with stake")]
    NoValidators,

    /// `FinalizeBlock` invoked before quorum stake has been collected.
    #[error("quorum not yet reached")]
    QuorumNotReached,

    // --- Persistence ---
    /// A mandatory read returned nothing.
    #[error("requested record not found")]
    NotFound,

    /// The durable store rejected a write.
    #[error("persistence write failed: {0}")]
    PersistenceWrite(String),

    /// (De)serialization of a stored record failed.
    #[error("record serialization failed: {0}")]
    Serialization(String),

    // --- Resource ---
    /// Operation observed the shutdown signal and aborted.
    #[error("operation aborted: node is shutting down")]
    ShuttingDown,

    /// An internal lock was found poisoned by a panicking holder.
    #[error("internal lock was poisoned")]
    LockPoisoned,

    /// Placeholder for errors originating from external crates.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::PersistenceWrite(e.to_string())
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(e: sled::transaction::TransactionError<Error>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(se) => Error::from(se),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_human_message() {
        let e = Error::InvalidHeight { expected: 2, got: 5 };
        assert_eq!(e.to_string(), "block height 5 is not the expected 2");
    }
}
