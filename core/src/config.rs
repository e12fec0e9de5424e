//! Consensus and runtime configuration for **Obscura** core.
//!
//! The [`Config`] struct centralises tunable parameters for the consensus
//! engine. It is constructed via the [`ConfigBuilder`] using the fluent
//! builder pattern, enabling callers to customise only the fields they care
//! about while keeping sensible defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.block_time_secs, 2);
//! ```

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,

    /// Target time between proposed blocks, in seconds.
    pub block_time_secs: u64,

    /// Number of blocks an unbonding validator must wait before its stake
    /// is withdrawable.
    pub unbonding_period: u64,

    /// Percent of staked amount removed per slashable infraction (10 == 10%).
    pub slash_fraction_pct: u64,

    /// Number of accumulated slashes after which a validator is forcibly
    /// deactivated.
    pub max_slashes: u32,

    /// Maximum allowed clock drift, in seconds, for a proposed block's
    /// timestamp compared to local wall-clock time.
    pub max_future_drift_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: "main".into(),
            block_time_secs: 2,
            unbonding_period: 100,
            slash_fraction_pct: 10,
            max_slashes: 3,
            max_future_drift_secs: 60,
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    pub fn block_time_secs(mut self, secs: u64) -> Self {
        self.inner.block_time_secs = secs;
        self
    }

    pub fn unbonding_period(mut self, blocks: u64) -> Self {
        self.inner.unbonding_period = blocks;
        self
    }

    pub fn slash_fraction_pct(mut self, pct: u64) -> Self {
        self.inner.slash_fraction_pct = pct;
        self
    }

    pub fn max_slashes(mut self, count: u32) -> Self {
        self.inner.max_slashes = count;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
