//! Configuration for the session registry.

use std::time::Duration;

use stratum_types::HasSessionConfig;
use stratum_types::config_defaults as defaults;

use crate::error::{Result, SessionError};

/// Configuration for the session registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Live sessions a single user may hold before the oldest is evicted.
    pub max_sessions_per_user: usize,

    /// Maximum age of a session regardless of activity.
    pub absolute_timeout: Duration,

    /// Maximum gap between two accesses of a session.
    pub idle_timeout: Duration,

    /// IP changes after which the security scan flags a session.
    pub anomaly_ip_change_threshold: u32,

    /// IP changes after which validation invalidates the session.
    /// `None` tolerates any number of changes.
    pub max_ip_changes: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_user: defaults::MAX_SESSIONS_PER_USER,
            absolute_timeout: defaults::absolute_timeout(),
            idle_timeout: defaults::idle_timeout(),
            anomaly_ip_change_threshold: defaults::ANOMALY_IP_CHANGE_THRESHOLD,
            max_ip_changes: None,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from any session config provider.
    pub fn from_provider<C: HasSessionConfig>(provider: &C) -> Self {
        Self {
            max_sessions_per_user: provider.max_sessions_per_user(),
            absolute_timeout: provider.absolute_timeout(),
            idle_timeout: provider.idle_timeout(),
            anomaly_ip_change_threshold: provider.anomaly_ip_change_threshold(),
            max_ip_changes: provider.max_ip_changes(),
        }
    }

    /// Set the per-user session ceiling.
    pub fn with_max_sessions_per_user(mut self, max: usize) -> Self {
        self.max_sessions_per_user = max;
        self
    }

    /// Set the absolute session lifetime.
    pub fn with_absolute_timeout(mut self, timeout: Duration) -> Self {
        self.absolute_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the IP change count the security scan flags.
    pub fn with_anomaly_threshold(mut self, changes: u32) -> Self {
        self.anomaly_ip_change_threshold = changes;
        self
    }

    /// Invalidate sessions on validation once they exceed `changes` IP changes.
    pub fn with_max_ip_changes(mut self, changes: u32) -> Self {
        self.max_ip_changes = Some(changes);
        self
    }

    /// Check the configuration for nonsensical bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions_per_user == 0 {
            return Err(SessionError::ZeroSessionLimit);
        }
        if self.absolute_timeout.is_zero() {
            return Err(SessionError::ZeroTimeout { which: "absolute" });
        }
        if self.idle_timeout.is_zero() {
            return Err(SessionError::ZeroTimeout { which: "idle" });
        }
        if self.idle_timeout > self.absolute_timeout {
            return Err(SessionError::IdleExceedsAbsolute {
                idle_secs: self.idle_timeout.as_secs(),
                absolute_secs: self.absolute_timeout.as_secs(),
            });
        }
        Ok(())
    }
}
