//! Genesis configuration schema.
//!
//! Loading the genesis file from disk is out of scope for this crate;
//! `core` only defines the shape and how it seeds a fresh
//! [`crate::ledger::Ledger`].

use serde::{Deserialize, Serialize};

use crate::ValidatorState;

/// Genesis parameters for a chain, matching the JSON schema the
/// out-of-scope CLI reads from disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisConfig {
    pub chain_id: String,
    pub genesis_time: String,
    pub initial_supply: u64,
    pub initial_validators: Vec<ValidatorState>,
}
