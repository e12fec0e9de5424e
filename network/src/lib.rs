//! Gossip transport for `obscura-core`'s [`obscura_core::GossipOracle`].
//!
//! Peer discovery, transport security, and topic subscription wiring are
//! not yet implemented here; the core crate's consensus and ledger logic
//! does not depend on this crate to function in tests.
