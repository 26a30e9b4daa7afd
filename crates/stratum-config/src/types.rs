//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [cache]                  # tier capacities and TTLs
//! [cache.filter]           # membership filter sizing
//! [[cache.routes]]         # key prefix → tier routing table
//! [session]                # session limits and timeouts
//! [maintenance]            # background sweep intervals
//! ```

use std::time::Duration;

use serde::Deserialize;
use stratum_types::config_defaults as defaults;
use stratum_types::{
    ConfigProvider, HasCacheConfig, HasMaintenanceConfig, HasSessionConfig, Tier, TierSettings,
};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    /// Tiered cache configuration.
    pub cache: Option<CacheSection>,

    /// Session registry configuration.
    pub session: Option<SessionSection>,

    /// Background maintenance configuration.
    pub maintenance: Option<MaintenanceSection>,
}

impl StratumConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale, not field by field.
    pub fn merge(&mut self, other: StratumConfig) {
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.maintenance.is_some() {
            self.maintenance = other.maintenance;
        }
    }

    /// The `[cache]` section, or defaults when absent.
    pub fn cache_or_default(&self) -> CacheSection {
        self.cache.clone().unwrap_or_default()
    }

    /// The `[session]` section, or defaults when absent.
    pub fn session_or_default(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// The `[maintenance]` section, or defaults when absent.
    pub fn maintenance_or_default(&self) -> MaintenanceSection {
        self.maintenance.clone().unwrap_or_default()
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        self.cache_or_default().validate()?;
        self.session_or_default().validate()?;
        self.maintenance_or_default().validate()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require_nonzero(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tiered cache configuration.
///
/// ```toml
/// [cache]
/// hot_capacity = 1000
/// hot_ttl_secs = 300
/// fallback_tier = "cold"
///
/// [cache.filter]
/// expected_elements = 1000000
/// false_positive_rate = 0.01
///
/// [[cache.routes]]
/// prefix = "session:"
/// tier = "hot"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub hot_capacity: usize,
    pub warm_capacity: usize,
    pub cold_capacity: usize,
    pub hot_ttl_secs: u64,
    pub warm_ttl_secs: u64,
    pub cold_ttl_secs: u64,

    /// Membership filter sizing.
    pub filter: FilterSection,

    /// Prefix routing table, first match wins. Empty means the built-in
    /// table.
    pub routes: Vec<RouteConfig>,

    /// Tier for keys no route matches.
    pub fallback_tier: Tier,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            hot_capacity: defaults::HOT_CAPACITY,
            warm_capacity: defaults::WARM_CAPACITY,
            cold_capacity: defaults::COLD_CAPACITY,
            hot_ttl_secs: defaults::HOT_TTL_SECS,
            warm_ttl_secs: defaults::WARM_TTL_SECS,
            cold_ttl_secs: defaults::COLD_TTL_SECS,
            filter: FilterSection::default(),
            routes: Vec::new(),
            fallback_tier: Tier::Cold,
        }
    }
}

impl CacheSection {
    fn validate(&self) -> Result<()> {
        require_nonzero("cache.hot_capacity", self.hot_capacity as u64)?;
        require_nonzero("cache.warm_capacity", self.warm_capacity as u64)?;
        require_nonzero("cache.cold_capacity", self.cold_capacity as u64)?;
        require_nonzero("cache.hot_ttl_secs", self.hot_ttl_secs)?;
        require_nonzero("cache.warm_ttl_secs", self.warm_ttl_secs)?;
        require_nonzero("cache.cold_ttl_secs", self.cold_ttl_secs)?;
        require_nonzero(
            "cache.filter.expected_elements",
            self.filter.expected_elements as u64,
        )?;
        let rate = self.filter.false_positive_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(invalid(
                "cache.filter.false_positive_rate",
                format!("must be between 0 and 1 (exclusive), got {rate}"),
            ));
        }
        if self.routes.iter().any(|route| route.prefix.is_empty()) {
            return Err(invalid("cache.routes", "route prefix must not be empty"));
        }
        Ok(())
    }

    /// Routes that can never match because an earlier prefix already
    /// covers them.
    pub fn shadowed_routes(&self) -> Vec<&RouteConfig> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(i, route)| {
                self.routes[..*i]
                    .iter()
                    .any(|earlier| route.prefix.starts_with(&earlier.prefix))
            })
            .map(|(_, route)| route)
            .collect()
    }
}

impl ConfigProvider for CacheSection {}

impl HasCacheConfig for CacheSection {
    fn hot_tier(&self) -> TierSettings {
        TierSettings::new(self.hot_capacity, Duration::from_secs(self.hot_ttl_secs))
    }

    fn warm_tier(&self) -> TierSettings {
        TierSettings::new(self.warm_capacity, Duration::from_secs(self.warm_ttl_secs))
    }

    fn cold_tier(&self) -> TierSettings {
        TierSettings::new(self.cold_capacity, Duration::from_secs(self.cold_ttl_secs))
    }

    fn filter_expected_elements(&self) -> usize {
        self.filter.expected_elements
    }

    fn filter_false_positive_rate(&self) -> f64 {
        self.filter.false_positive_rate
    }
}

/// Membership filter sizing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub expected_elements: usize,
    pub false_positive_rate: f64,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            expected_elements: defaults::FILTER_EXPECTED_ELEMENTS,
            false_positive_rate: defaults::FILTER_FALSE_POSITIVE_RATE,
        }
    }
}

/// One row of the prefix routing table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub tier: Tier,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session registry configuration.
///
/// ```toml
/// [session]
/// max_sessions_per_user = 5
/// absolute_timeout_secs = 86400
/// idle_timeout_secs = 7200
/// anomaly_ip_change_threshold = 5
/// max_ip_changes = 10
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub max_sessions_per_user: usize,
    pub absolute_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub anomaly_ip_change_threshold: u32,
    /// Unset tolerates any number of IP changes.
    pub max_ip_changes: Option<u32>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_sessions_per_user: defaults::MAX_SESSIONS_PER_USER,
            absolute_timeout_secs: defaults::ABSOLUTE_TIMEOUT_SECS,
            idle_timeout_secs: defaults::IDLE_TIMEOUT_SECS,
            anomaly_ip_change_threshold: defaults::ANOMALY_IP_CHANGE_THRESHOLD,
            max_ip_changes: None,
        }
    }
}

impl SessionSection {
    fn validate(&self) -> Result<()> {
        require_nonzero(
            "session.max_sessions_per_user",
            self.max_sessions_per_user as u64,
        )?;
        require_nonzero("session.absolute_timeout_secs", self.absolute_timeout_secs)?;
        require_nonzero("session.idle_timeout_secs", self.idle_timeout_secs)?;
        if self.idle_timeout_secs > self.absolute_timeout_secs {
            return Err(invalid(
                "session.idle_timeout_secs",
                format!(
                    "{} exceeds absolute_timeout_secs ({})",
                    self.idle_timeout_secs, self.absolute_timeout_secs
                ),
            ));
        }
        Ok(())
    }
}

impl ConfigProvider for SessionSection {}

impl HasSessionConfig for SessionSection {
    fn max_sessions_per_user(&self) -> usize {
        self.max_sessions_per_user
    }

    fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.absolute_timeout_secs)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn anomaly_ip_change_threshold(&self) -> u32 {
        self.anomaly_ip_change_threshold
    }

    fn max_ip_changes(&self) -> Option<u32> {
        self.max_ip_changes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Maintenance Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Background maintenance configuration.
///
/// ```toml
/// [maintenance]
/// enabled = true
/// cache_cleanup_interval_secs = 60
/// session_cleanup_interval_secs = 300
/// security_scan_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    pub enabled: bool,
    pub cache_cleanup_interval_secs: u64,
    pub session_cleanup_interval_secs: u64,
    pub security_scan_interval_secs: u64,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_cleanup_interval_secs: defaults::CACHE_CLEANUP_INTERVAL_SECS,
            session_cleanup_interval_secs: defaults::SESSION_CLEANUP_INTERVAL_SECS,
            security_scan_interval_secs: defaults::SECURITY_SCAN_INTERVAL_SECS,
        }
    }
}

impl MaintenanceSection {
    fn validate(&self) -> Result<()> {
        require_nonzero(
            "maintenance.cache_cleanup_interval_secs",
            self.cache_cleanup_interval_secs,
        )?;
        require_nonzero(
            "maintenance.session_cleanup_interval_secs",
            self.session_cleanup_interval_secs,
        )?;
        require_nonzero(
            "maintenance.security_scan_interval_secs",
            self.security_scan_interval_secs,
        )
    }
}

impl ConfigProvider for MaintenanceSection {}

impl HasMaintenanceConfig for MaintenanceSection {
    fn maintenance_enabled(&self) -> bool {
        self.enabled
    }

    fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval_secs)
    }

    fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_interval_secs)
    }

    fn security_scan_interval(&self) -> Duration {
        Duration::from_secs(self.security_scan_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
