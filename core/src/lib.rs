//! Obscura Core Library
//!
//! Implements the privacy-preserving permissioned ledger: stealth
//! addressing and linkable ring signatures ([`keys`], [`ring`]), the UTXO
//! transaction and block models ([`tx`], [`block`]), ledger state
//! transitions ([`ledger`]), stake-weighted BFT consensus ([`consensus`]),
//! durable persistence ([`store`]), and the node orchestrator that wires
//! them together ([`node`]).
//!
//! Networking transport, CLI argument parsing, and wallet file formats are
//! out of scope for this crate; `core` exposes the types and state
//! transitions those outer layers are built on top of.

pub mod block;
pub mod config;
pub mod consensus;
pub mod error;
pub mod genesis;
pub mod keys;
pub mod ledger;
pub mod node;
mod primitives;
pub mod ring;
pub mod store;
pub mod tx;

pub use block::{compute_tx_root, Block, BlockHeader, ValidatorSignature};
pub use config::{Config, ConfigBuilder};
pub use consensus::{quorum_threshold, select_proposer, ConsensusEngine, StakingTx};
pub use error::{Error, Result};
pub use genesis::GenesisConfig;
pub use ledger::{Ledger, Utxo, UtxoKey, ValidatorState};
pub use node::{GossipOracle, Node, Topic, WireMessage};
pub use primitives::{Address, Hash, KeyPair, PublicKey, Signature, WalletKeys};
pub use ring::RingSignature;
pub use store::Store;
pub use tx::{Transaction, TxInput, TxOutput};
