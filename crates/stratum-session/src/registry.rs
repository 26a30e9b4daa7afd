//! Authoritative session registry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::RngCore;
use serde::Serialize;
use stratum_cache::TieredCache;
use stratum_types::{SharedClock, SystemClock};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::device::{DeviceRecord, DeviceRegistry};
use crate::error::Result;
use crate::record::{InvalidationReason, SessionRecord, short_id};
use crate::security::{SecurityAnomaly, SecurityTracker, SecurityTrackingRecord, SecurityVerdict};

/// Cache key prefix for session copies; routes to the hot tier by default.
pub const SESSION_KEY_PREFIX: &str = "session:";

fn cache_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

/// 32 bytes from the thread-local CSPRNG, URL-safe base64.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Maps guarded together by the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<String, SessionRecord>,
    by_user: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Default)]
struct Totals {
    created: AtomicU64,
    invalidated: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time registry statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_active_sessions: usize,
    pub total_active_users: usize,
    /// 0 when no user holds a session.
    pub average_sessions_per_user: f64,
    pub total_created: u64,
    /// Sessions removed for any reason other than expiry.
    pub total_invalidated: u64,
    pub total_expired: u64,
    pub tracked_devices: usize,
}

/// Concurrent session registry.
///
/// The registry's own maps are the source of truth. Session copies are
/// pushed into the shared [`TieredCache`] for fast reads, but a cached copy
/// is only trusted while the registry still holds the session.
///
/// Lock order: registry state, then security tracker, then device registry,
/// then cache tiers. Never the reverse.
pub struct SessionRegistry {
    config: SessionConfig,
    cache: TieredCache,
    clock: SharedClock,
    state: RwLock<RegistryState>,
    security: SecurityTracker,
    devices: DeviceRegistry,
    user_counts: DashMap<String, AtomicUsize>,
    totals: Totals,
}

impl SessionRegistry {
    /// Create a registry on the system clock.
    pub fn new(config: SessionConfig, cache: TieredCache) -> Result<Self> {
        Self::with_clock(config, cache, SystemClock::shared())
    }

    /// Create a registry on a custom clock.
    pub fn with_clock(config: SessionConfig, cache: TieredCache, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache,
            clock,
            state: RwLock::new(RegistryState::default()),
            security: SecurityTracker::new(),
            devices: DeviceRegistry::new(),
            user_counts: DashMap::new(),
            totals: Totals::default(),
        })
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session for `user_id`, returning its id.
    ///
    /// When the user is at the session ceiling, their oldest session is
    /// invalidated first.
    pub fn create_session(
        &self,
        user_id: &str,
        principal_name: &str,
        role: &str,
        device_fingerprint: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> String {
        let now = self.clock.now();
        let session_id = generate_session_id();
        let record = SessionRecord {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            principal_name: principal_name.to_string(),
            role: role.to_string(),
            created_at: now,
            last_accessed_at: now,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            device_fingerprint: device_fingerprint.to_string(),
            is_active: true,
            request_count: 0,
            suspicious: false,
        };

        let mut state = self.state.write();
        while state
            .by_user
            .get(user_id)
            .is_some_and(|ids| ids.len() >= self.config.max_sessions_per_user)
        {
            let Some(oldest) = oldest_session(&state, user_id) else {
                break;
            };
            self.remove_locked(&mut state, &oldest, InvalidationReason::ConcurrentLimit);
        }

        state
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id.clone());
        state.sessions.insert(session_id.clone(), record.clone());

        self.security.track(
            &session_id,
            SecurityTrackingRecord::new(ip_address, user_agent, device_fingerprint),
        );
        self.devices
            .register(device_fingerprint, &session_id, user_agent, ip_address, now);
        self.user_counts
            .entry(user_id.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        self.cache.put(
            cache_key(&session_id),
            record,
            Some(self.config.absolute_timeout),
        );
        drop(state);

        self.totals.created.fetch_add(1, Ordering::Relaxed);
        info!(
            session = %short_id(&session_id),
            user_id = %user_id,
            device = %device_fingerprint,
            "Session created"
        );
        session_id
    }

    /// Validate an access to `session_id` from `ip_address` with
    /// `user_agent`.
    ///
    /// Returns the updated record on success. Expired sessions and sessions
    /// failing a security check are invalidated; an unknown or inactive
    /// session simply yields `None`.
    pub fn validate_session(
        &self,
        session_id: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Option<SessionRecord> {
        let now = self.clock.now();
        let key = cache_key(session_id);
        let cached: Option<SessionRecord> = self.cache.get(&key);

        // The registry map decides; a cached copy only has to agree that the
        // session exists.
        let authoritative = self.state.read().sessions.get(session_id).cloned();
        let record = match (authoritative, cached) {
            (Some(authoritative), _) => authoritative,
            (None, Some(_)) => {
                self.cache.remove(&key);
                debug!(session = %short_id(session_id), "Dropped stale cached session");
                return None;
            }
            (None, None) => return None,
        };

        if !record.is_active {
            return None;
        }

        if record.is_expired(now, self.config.absolute_timeout, self.config.idle_timeout) {
            self.invalidate_with(session_id, InvalidationReason::Expired);
            return None;
        }

        match self
            .security
            .check(session_id, ip_address, user_agent, self.config.max_ip_changes)
        {
            SecurityVerdict::Passed => {}
            SecurityVerdict::Untracked | SecurityVerdict::UserAgentMismatch => {
                warn!(
                    session = %short_id(session_id),
                    user_id = %record.user_id,
                    ip = %ip_address,
                    "Security validation failed"
                );
                self.invalidate_with(session_id, InvalidationReason::SecurityViolation);
                return None;
            }
            SecurityVerdict::IpChurn { changes } => {
                warn!(
                    session = %short_id(session_id),
                    user_id = %record.user_id,
                    changes,
                    "Session exceeded IP change limit"
                );
                self.invalidate_with(session_id, InvalidationReason::IpChurn);
                return None;
            }
        }

        let mut state = self.state.write();
        let authoritative = state.sessions.get_mut(session_id)?;
        authoritative.touch(now);
        let updated = authoritative.clone();

        self.devices
            .touch(&updated.device_fingerprint, ip_address, now);
        self.cache.put(
            key,
            updated.clone(),
            Some(updated.remaining_lifetime(now, self.config.absolute_timeout)),
        );
        Some(updated)
    }

    /// Invalidate one session. Returns `false` if it was unknown.
    pub fn invalidate_session(&self, session_id: &str) -> bool {
        self.invalidate_with(session_id, InvalidationReason::Logout)
    }

    /// Invalidate every session of `user_id`, returning how many there were.
    pub fn invalidate_all_user_sessions(&self, user_id: &str) -> usize {
        let mut state = self.state.write();
        let ids: Vec<String> = state
            .by_user
            .get(user_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        for id in &ids {
            self.remove_locked(&mut state, id, InvalidationReason::Logout);
        }
        drop(state);

        if !ids.is_empty() {
            info!(user_id = %user_id, count = ids.len(), "Invalidated all user sessions");
        }
        ids.len()
    }

    /// Live sessions of `user_id`, oldest first.
    pub fn user_active_sessions(&self, user_id: &str) -> Vec<SessionRecord> {
        let now = self.clock.now();
        let state = self.state.read();
        let mut sessions: Vec<SessionRecord> = state
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.sessions.get(id))
            .filter(|record| {
                record.is_active
                    && !record.is_expired(
                        now,
                        self.config.absolute_timeout,
                        self.config.idle_timeout,
                    )
            })
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Authoritative record for `session_id`. Does not count as an access.
    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.state.read().sessions.get(session_id).cloned()
    }

    /// Tracked origin of `session_id`.
    pub fn security_record(&self, session_id: &str) -> Option<SecurityTrackingRecord> {
        self.security.get(session_id)
    }

    pub fn device(&self, fingerprint: &str) -> Option<DeviceRecord> {
        self.devices.get(fingerprint)
    }

    /// Live session count for `user_id`.
    pub fn user_session_count(&self, user_id: &str) -> usize {
        self.user_counts
            .get(user_id)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Invalidate every expired session, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write();
        let expired: Vec<String> = state
            .sessions
            .values()
            .filter(|record| {
                record.is_expired(now, self.config.absolute_timeout, self.config.idle_timeout)
            })
            .map(|record| record.session_id.clone())
            .collect();
        for id in &expired {
            self.remove_locked(&mut state, id, InvalidationReason::Expired);
        }
        drop(state);

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Cleaned up expired sessions");
        }
        expired.len()
    }

    /// Flag sessions whose IP changed more than the anomaly threshold.
    ///
    /// Every anomalous session is returned; each is logged once, when first
    /// marked suspicious.
    pub fn security_scan(&self) -> Vec<SecurityAnomaly> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let flagged = self
            .security
            .exceeding(self.config.anomaly_ip_change_threshold);

        let mut anomalies = Vec::with_capacity(flagged.len());
        for (session_id, tracking) in flagged {
            let Some(record) = state.sessions.get_mut(&session_id) else {
                continue;
            };
            if !record.suspicious {
                record.suspicious = true;
                warn!(
                    session = %short_id(&session_id),
                    user_id = %record.user_id,
                    changes = tracking.ip_change_count,
                    "Suspicious IP activity"
                );
                self.cache.put(
                    cache_key(&session_id),
                    record.clone(),
                    Some(record.remaining_lifetime(now, self.config.absolute_timeout)),
                );
            }
            anomalies.push(SecurityAnomaly {
                user_id: record.user_id.clone(),
                session_id,
                ip_change_count: tracking.ip_change_count,
                ip_history: tracking.ip_history,
            });
        }
        anomalies
    }

    /// Get registry statistics.
    pub fn stats(&self) -> SessionStats {
        let (sessions, users) = {
            let state = self.state.read();
            (state.sessions.len(), state.by_user.len())
        };
        let average = if users == 0 {
            0.0
        } else {
            sessions as f64 / users as f64
        };

        SessionStats {
            total_active_sessions: sessions,
            total_active_users: users,
            average_sessions_per_user: average,
            total_created: self.totals.created.load(Ordering::Relaxed),
            total_invalidated: self.totals.invalidated.load(Ordering::Relaxed),
            total_expired: self.totals.expired.load(Ordering::Relaxed),
            tracked_devices: self.devices.len(),
        }
    }

    fn invalidate_with(&self, session_id: &str, reason: InvalidationReason) -> bool {
        let mut state = self.state.write();
        self.remove_locked(&mut state, session_id, reason).is_some()
    }

    /// Remove a session from every index. Caller holds the state write lock.
    fn remove_locked(
        &self,
        state: &mut RegistryState,
        session_id: &str,
        reason: InvalidationReason,
    ) -> Option<SessionRecord> {
        let record = state.sessions.remove(session_id)?;

        if let Some(ids) = state.by_user.get_mut(&record.user_id) {
            ids.remove(session_id);
            if ids.is_empty() {
                state.by_user.remove(&record.user_id);
            }
        }
        self.release_user_slot(&record.user_id);
        self.security.remove(session_id);
        self.devices.detach(&record.device_fingerprint, session_id);
        self.cache.remove(&cache_key(session_id));

        let total = match reason {
            InvalidationReason::Expired => &self.totals.expired,
            _ => &self.totals.invalidated,
        };
        total.fetch_add(1, Ordering::Relaxed);

        info!(
            session = %short_id(session_id),
            user_id = %record.user_id,
            reason = %reason,
            "Session invalidated"
        );
        Some(record)
    }

    fn release_user_slot(&self, user_id: &str) {
        if let Some(count) = self.user_counts.get(user_id) {
            let _ = count.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        }
        self.user_counts
            .remove_if(user_id, |_, count| count.load(Ordering::Relaxed) == 0);
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

fn oldest_session(state: &RegistryState, user_id: &str) -> Option<String> {
    state
        .by_user
        .get(user_id)?
        .iter()
        .filter_map(|id| state.sessions.get(id))
        .min_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        })
        .map(|record| record.session_id.clone())
}
