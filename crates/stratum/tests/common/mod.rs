//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use stratum::{ManualClock, Stratum, StratumConfig};

pub const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0";
pub const OTHER_UA: &str = "curl/8.5.0";

/// A stratum instance on a manually driven clock.
pub struct TestStratum {
    pub stratum: Stratum,
    pub clock: Arc<ManualClock>,
}

impl TestStratum {
    /// Build with default configuration.
    pub fn start() -> Result<Self> {
        Self::with_config(StratumConfig::default())
    }

    /// Build from TOML, missing sections take their defaults.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::with_config(StratumConfig::from_toml(toml)?)
    }

    pub fn with_config(config: StratumConfig) -> Result<Self> {
        let clock = Arc::new(ManualClock::starting_now());
        let stratum = Stratum::with_clock(&config, clock.clone())?;
        Ok(Self { stratum, clock })
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Log `user_id` in from a fixed device and address.
    pub fn login(&self, user_id: &str) -> String {
        self.stratum
            .sessions()
            .create_session(user_id, user_id, "customer", "fp-1", "10.0.0.1", UA)
    }
}
