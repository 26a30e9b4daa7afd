//! Configuration traits for decoupled config passing between crates.
//!
//! The cache and session crates only depend on these capabilities, not on the
//! TOML schema in `stratum-config`. Each trait represents one configuration
//! concern.

use std::time::Duration;

/// Base trait for all configuration types.
///
/// Implementations should be cheaply cloneable and thread-safe.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// Capacity and default TTL of a single cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSettings {
    /// Maximum number of entries held by the tier.
    pub capacity: usize,
    /// TTL applied when a value is stored without an explicit one.
    pub default_ttl: Duration,
}

impl TierSettings {
    pub const fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity,
            default_ttl,
        }
    }
}

/// Tiered cache configuration.
pub trait HasCacheConfig: ConfigProvider {
    /// Hot tier settings.
    fn hot_tier(&self) -> TierSettings;

    /// Warm tier settings.
    fn warm_tier(&self) -> TierSettings;

    /// Cold tier settings.
    fn cold_tier(&self) -> TierSettings;

    /// Number of distinct keys the membership filter is sized for.
    fn filter_expected_elements(&self) -> usize {
        defaults::FILTER_EXPECTED_ELEMENTS
    }

    /// Target false-positive rate of the membership filter.
    fn filter_false_positive_rate(&self) -> f64 {
        defaults::FILTER_FALSE_POSITIVE_RATE
    }
}

/// Session registry configuration.
pub trait HasSessionConfig: ConfigProvider {
    /// Maximum number of live sessions per user.
    fn max_sessions_per_user(&self) -> usize;

    /// Maximum age of a session regardless of activity.
    fn absolute_timeout(&self) -> Duration;

    /// Maximum gap between two accesses of a session.
    fn idle_timeout(&self) -> Duration;

    /// IP changes after which the security scan flags a session.
    fn anomaly_ip_change_threshold(&self) -> u32 {
        defaults::ANOMALY_IP_CHANGE_THRESHOLD
    }

    /// IP changes after which validation forces re-authentication.
    /// `None` tolerates any number of changes.
    fn max_ip_changes(&self) -> Option<u32> {
        None
    }
}

/// Background maintenance configuration.
pub trait HasMaintenanceConfig: ConfigProvider {
    /// Whether the maintenance tasks run at all.
    fn maintenance_enabled(&self) -> bool {
        true
    }

    /// Interval between expired cache entry sweeps.
    fn cache_cleanup_interval(&self) -> Duration;

    /// Interval between expired session sweeps.
    fn session_cleanup_interval(&self) -> Duration;

    /// Interval between security anomaly scans.
    fn security_scan_interval(&self) -> Duration;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default values
// ─────────────────────────────────────────────────────────────────────────────

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    use super::TierSettings;

    pub const HOT_CAPACITY: usize = 1_000;
    pub const WARM_CAPACITY: usize = 5_000;
    pub const COLD_CAPACITY: usize = 10_000;
    pub const HOT_TTL_SECS: u64 = 5 * 60;
    pub const WARM_TTL_SECS: u64 = 30 * 60;
    pub const COLD_TTL_SECS: u64 = 60 * 60;

    pub const FILTER_EXPECTED_ELEMENTS: usize = 1_000_000;
    pub const FILTER_FALSE_POSITIVE_RATE: f64 = 0.01;

    pub const MAX_SESSIONS_PER_USER: usize = 5;
    pub const ABSOLUTE_TIMEOUT_SECS: u64 = 24 * 60 * 60;
    pub const IDLE_TIMEOUT_SECS: u64 = 2 * 60 * 60;
    pub const ANOMALY_IP_CHANGE_THRESHOLD: u32 = 5;
    /// Window in which a session counts as recently active.
    pub const RECENT_ACTIVITY_SECS: u64 = 5 * 60;

    pub const CACHE_CLEANUP_INTERVAL_SECS: u64 = 60;
    pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
    pub const SECURITY_SCAN_INTERVAL_SECS: u64 = 60;

    pub fn hot_tier() -> TierSettings {
        TierSettings::new(HOT_CAPACITY, Duration::from_secs(HOT_TTL_SECS))
    }

    pub fn warm_tier() -> TierSettings {
        TierSettings::new(WARM_CAPACITY, Duration::from_secs(WARM_TTL_SECS))
    }

    pub fn cold_tier() -> TierSettings {
        TierSettings::new(COLD_CAPACITY, Duration::from_secs(COLD_TTL_SECS))
    }

    pub fn absolute_timeout() -> Duration {
        Duration::from_secs(ABSOLUTE_TIMEOUT_SECS)
    }

    pub fn idle_timeout() -> Duration {
        Duration::from_secs(IDLE_TIMEOUT_SECS)
    }

    pub fn recent_activity_window() -> Duration {
        Duration::from_secs(RECENT_ACTIVITY_SECS)
    }

    pub fn cache_cleanup_interval() -> Duration {
        Duration::from_secs(CACHE_CLEANUP_INTERVAL_SECS)
    }

    pub fn session_cleanup_interval() -> Duration {
        Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS)
    }

    pub fn security_scan_interval() -> Duration {
        Duration::from_secs(SECURITY_SCAN_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Minimal;

    impl ConfigProvider for Minimal {}

    impl HasSessionConfig for Minimal {
        fn max_sessions_per_user(&self) -> usize {
            3
        }

        fn absolute_timeout(&self) -> Duration {
            Duration::from_secs(60)
        }

        fn idle_timeout(&self) -> Duration {
            Duration::from_secs(30)
        }
    }

    #[test]
    fn test_session_trait_defaults() {
        let config = Minimal;
        assert_eq!(
            config.anomaly_ip_change_threshold(),
            defaults::ANOMALY_IP_CHANGE_THRESHOLD
        );
        assert!(config.max_ip_changes().is_none());
    }

    #[test]
    fn test_tier_defaults_shrink_towards_hot() {
        let hot = defaults::hot_tier();
        let warm = defaults::warm_tier();
        let cold = defaults::cold_tier();
        assert!(hot.capacity < warm.capacity && warm.capacity < cold.capacity);
        assert!(hot.default_ttl < warm.default_ttl && warm.default_ttl < cold.default_ttl);
    }

    #[test]
    fn test_idle_shorter_than_absolute() {
        assert!(defaults::idle_timeout() < defaults::absolute_timeout());
    }
}
