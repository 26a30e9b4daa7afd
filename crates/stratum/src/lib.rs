//! Tiered in-process cache and concurrent session registry.
//!
//! [`Stratum`] wires a [`TieredCache`] and a [`SessionRegistry`] together
//! from a [`StratumConfig`] and owns the background maintenance lifecycle.
//!
//! ```rust,ignore
//! let stratum = Stratum::load(None)?;
//! let maintenance = stratum.start_maintenance();
//!
//! stratum.cache().put("catalog:42", product, None);
//! let id = stratum
//!     .sessions()
//!     .create_session("u1", "alice", "customer", "fp", "10.0.0.1", ua);
//! ```

pub mod error;
pub mod maintenance;
pub mod telemetry;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

pub use error::{Error, Result};
pub use maintenance::{MaintenanceHandle, MaintenanceSchedule};
pub use stratum_cache::{
    CacheConfig, CacheKey, CacheStats, PrefixRouter, TieredCache, TierRouter,
};
pub use stratum_config::{CacheSection, LoadedConfig, StratumConfig};
pub use stratum_session::{
    InvalidationReason, SecurityAnomaly, SessionConfig, SessionRecord, SessionRegistry,
    SessionStats,
};
pub use stratum_types::{Clock, ManualClock, SharedClock, SystemClock, Tier};

/// A cache and session registry built from one configuration.
#[derive(Debug, Clone)]
pub struct Stratum {
    cache: TieredCache,
    sessions: Arc<SessionRegistry>,
    schedule: MaintenanceSchedule,
}

impl Stratum {
    /// Build from an explicit configuration on the system clock.
    pub fn from_config(config: &StratumConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Build from an explicit configuration on a custom clock.
    pub fn with_clock(config: &StratumConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        let cache_section = config.cache_or_default();
        let cache = TieredCache::with_parts(
            CacheConfig::from_provider(&cache_section),
            router_for(&cache_section),
            Arc::clone(&clock),
        )?;

        let session_config = SessionConfig::from_provider(&config.session_or_default());
        let sessions = Arc::new(SessionRegistry::with_clock(
            session_config,
            cache.clone(),
            clock,
        )?);

        let schedule = MaintenanceSchedule::from_provider(&config.maintenance_or_default());

        info!(
            hot = cache_section.hot_capacity,
            warm = cache_section.warm_capacity,
            cold = cache_section.cold_capacity,
            max_sessions_per_user = sessions.config().max_sessions_per_user,
            maintenance = schedule.enabled,
            "Stratum initialized"
        );

        Ok(Self {
            cache,
            sessions,
            schedule,
        })
    }

    /// Discover and merge config files, then build.
    ///
    /// Layer warnings are logged and do not fail the load.
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let loaded = stratum_config::load_config(project_dir)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }
        Self::from_config(&loaded.config)
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn schedule(&self) -> &MaintenanceSchedule {
        &self.schedule
    }

    /// Spawn the maintenance tasks, or `None` when maintenance is disabled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_maintenance(&self) -> Option<MaintenanceHandle> {
        if !self.schedule.enabled {
            return None;
        }
        Some(MaintenanceHandle::spawn(
            self.cache.clone(),
            Arc::clone(&self.sessions),
            &self.schedule,
        ))
    }
}

/// Routing table from `[[cache.routes]]`, or the built-in table when none
/// are configured. The configured fallback tier applies either way.
fn router_for(section: &CacheSection) -> PrefixRouter {
    let router = PrefixRouter::new(section.fallback_tier);
    if section.routes.is_empty() {
        PrefixRouter::default()
            .routes()
            .iter()
            .fold(router, |router, (prefix, tier)| {
                router.with_route(prefix.clone(), *tier)
            })
    } else {
        section.routes.iter().fold(router, |router, route| {
            router.with_route(route.prefix.clone(), route.tier)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_config::{MaintenanceSection, RouteConfig, SessionSection};

    #[test]
    fn test_router_defaults_keep_fallback() {
        let section = CacheSection {
            fallback_tier: Tier::Warm,
            ..Default::default()
        };
        let router = router_for(&section);
        assert_eq!(router.route("session:x"), Tier::Hot);
        assert_eq!(router.route("catalog:x"), Tier::Warm);
        assert_eq!(router.route("anything"), Tier::Warm);
    }

    #[test]
    fn test_router_from_config_routes() {
        let section = CacheSection {
            routes: vec![RouteConfig {
                prefix: "menu:".to_string(),
                tier: Tier::Hot,
            }],
            ..Default::default()
        };
        let router = router_for(&section);
        assert_eq!(router.route("menu:1"), Tier::Hot);
        // Configured routes replace the built-in table.
        assert_eq!(router.route("session:x"), Tier::Cold);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StratumConfig {
            session: Some(SessionSection {
                max_sessions_per_user: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = Stratum::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_sessions_share_cache() {
        let stratum = Stratum::from_config(&StratumConfig::default()).unwrap();
        let id = stratum
            .sessions()
            .create_session("u1", "alice", "customer", "fp", "10.0.0.1", "UA");
        let key = format!("{}{}", stratum_session::SESSION_KEY_PREFIX, id);
        assert_eq!(stratum.cache().tier_of(&key), Some(Tier::Hot));
    }

    #[tokio::test]
    async fn test_maintenance_disabled() {
        let config = StratumConfig {
            maintenance: Some(MaintenanceSection {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let stratum = Stratum::from_config(&config).unwrap();
        assert!(stratum.start_maintenance().is_none());
    }

    #[tokio::test]
    async fn test_maintenance_enabled_by_default() {
        let stratum = Stratum::from_config(&StratumConfig::default()).unwrap();
        let handle = stratum.start_maintenance().unwrap();
        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
