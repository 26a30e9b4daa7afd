//! Configuration for the tiered cache.

use std::time::Duration;

use stratum_types::config_defaults as defaults;
use stratum_types::{HasCacheConfig, Tier, TierSettings};

use crate::error::{CacheError, Result};

/// Configuration for the tiered cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hot tier: small, short-lived, LRU.
    pub hot: TierSettings,

    /// Warm tier: medium, score-based eviction.
    pub warm: TierSettings,

    /// Cold tier: large, long-lived, FIFO.
    pub cold: TierSettings,

    /// Number of distinct keys the membership filter is sized for.
    pub filter_expected_elements: usize,

    /// Target false-positive rate of the membership filter.
    pub filter_false_positive_rate: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot: defaults::hot_tier(),
            warm: defaults::warm_tier(),
            cold: defaults::cold_tier(),
            filter_expected_elements: defaults::FILTER_EXPECTED_ELEMENTS,
            filter_false_positive_rate: defaults::FILTER_FALSE_POSITIVE_RATE,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from any cache config provider.
    pub fn from_provider<C: HasCacheConfig>(provider: &C) -> Self {
        Self {
            hot: provider.hot_tier(),
            warm: provider.warm_tier(),
            cold: provider.cold_tier(),
            filter_expected_elements: provider.filter_expected_elements(),
            filter_false_positive_rate: provider.filter_false_positive_rate(),
        }
    }

    /// Set the capacity of one tier.
    pub fn with_capacity(mut self, tier: Tier, capacity: usize) -> Self {
        self.tier_mut(tier).capacity = capacity;
        self
    }

    /// Set the default TTL of one tier.
    pub fn with_ttl(mut self, tier: Tier, ttl: Duration) -> Self {
        self.tier_mut(tier).default_ttl = ttl;
        self
    }

    /// Size the membership filter.
    pub fn with_filter(mut self, expected_elements: usize, false_positive_rate: f64) -> Self {
        self.filter_expected_elements = expected_elements;
        self.filter_false_positive_rate = false_positive_rate;
        self
    }

    /// Settings for one tier.
    pub fn tier(&self, tier: Tier) -> TierSettings {
        match tier {
            Tier::Hot => self.hot,
            Tier::Warm => self.warm,
            Tier::Cold => self.cold,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut TierSettings {
        match tier {
            Tier::Hot => &mut self.hot,
            Tier::Warm => &mut self.warm,
            Tier::Cold => &mut self.cold,
        }
    }

    /// Check the configuration for nonsensical bounds.
    pub fn validate(&self) -> Result<()> {
        for tier in Tier::ALL {
            let settings = self.tier(tier);
            if settings.capacity == 0 {
                return Err(CacheError::ZeroCapacity { tier: tier.name() });
            }
            if settings.default_ttl.is_zero() {
                return Err(CacheError::ZeroTtl { tier: tier.name() });
            }
        }
        if self.filter_expected_elements == 0 {
            return Err(CacheError::ZeroExpectedElements);
        }
        let rate = self.filter_false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(CacheError::InvalidFalsePositiveRate(rate));
        }
        Ok(())
    }
}
