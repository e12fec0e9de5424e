//! JSON-RPC surface over `obscura-core`'s [`obscura_core::Node`].
//!
//! Method handlers are not yet implemented.
