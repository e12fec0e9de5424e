//! Reserved for a future zero-knowledge amount-confidentiality phase.
//!
//! `obscura-core`'s `range_proofs` field is an opaque byte blob this crate
//! is expected to eventually produce and verify; no proof system is wired
//! up yet.
