//! Shared types for the Stratum cache and session core.

pub mod clock;
pub mod config;
pub mod tier;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    ConfigProvider, HasCacheConfig, HasMaintenanceConfig, HasSessionConfig, TierSettings,
    defaults as config_defaults,
};
pub use tier::Tier;
