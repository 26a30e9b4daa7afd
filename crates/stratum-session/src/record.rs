//! Session records and invalidation reasons.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratum_types::config_defaults as defaults;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unguessable session token.
    pub session_id: String,

    pub user_id: String,

    /// Human-readable principal (email, username).
    pub principal_name: String,

    pub role: String,

    pub created_at: DateTime<Utc>,

    pub last_accessed_at: DateTime<Utc>,

    /// IP address the session was created from.
    pub ip_address: String,

    /// User agent the session was created with.
    pub user_agent: String,

    pub device_fingerprint: String,

    pub is_active: bool,

    /// Validated accesses since creation.
    pub request_count: u64,

    /// Flagged by the security scan.
    pub suspicious: bool,
}

impl SessionRecord {
    /// Time since creation.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Time since the last validated access.
    pub fn idle_time(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_accessed_at
    }

    /// Whether either the absolute or the idle timeout has been exceeded.
    pub fn is_expired(&self, now: DateTime<Utc>, absolute: Duration, idle: Duration) -> bool {
        exceeds(self.age(now), absolute) || exceeds(self.idle_time(now), idle)
    }

    /// Accessed within the last five minutes.
    pub fn is_recently_active(&self, now: DateTime<Utc>) -> bool {
        !exceeds(self.idle_time(now), defaults::recent_activity_window())
    }

    /// Suspicious sessions should be re-authenticated before sensitive
    /// operations.
    pub fn requires_reauth(&self) -> bool {
        self.suspicious
    }

    /// Record a validated access.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.request_count += 1;
    }

    /// Lifetime left before the absolute timeout, zero once passed.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>, absolute: Duration) -> Duration {
        let age = self.age(now).to_std().unwrap_or_default();
        absolute.saturating_sub(age)
    }
}

fn exceeds(elapsed: chrono::Duration, limit: Duration) -> bool {
    // Negative elapsed time (clock moved backwards) never exceeds a limit.
    elapsed.to_std().is_ok_and(|elapsed| elapsed > limit)
}

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// Explicit invalidation by the caller.
    Logout,
    /// Absolute or idle timeout exceeded.
    Expired,
    /// Oldest session evicted to admit a new one.
    ConcurrentLimit,
    /// Security check failed during validation.
    SecurityViolation,
    /// Too many IP changes under the configured policy.
    IpChurn,
}

impl InvalidationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidationReason::Logout => "logout",
            InvalidationReason::Expired => "expired",
            InvalidationReason::ConcurrentLimit => "concurrent_limit",
            InvalidationReason::SecurityViolation => "security_violation",
            InvalidationReason::IpChurn => "ip_churn",
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shortened session id for logs.
pub(crate) fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn record() -> SessionRecord {
        SessionRecord {
            session_id: "abcdefghijkl".into(),
            user_id: "u1".into(),
            principal_name: "alice@example.com".into(),
            role: "customer".into(),
            created_at: t0(),
            last_accessed_at: t0(),
            ip_address: "10.0.0.1".into(),
            user_agent: "Mozilla/5.0".into(),
            device_fingerprint: "fp-1".into(),
            is_active: true,
            request_count: 0,
            suspicious: false,
        }
    }

    const DAY: Duration = Duration::from_secs(24 * 3600);
    const TWO_HOURS: Duration = Duration::from_secs(2 * 3600);

    #[test]
    fn test_idle_timeout() {
        let record = record();
        assert!(!record.is_expired(t0() + chrono::Duration::hours(2), DAY, TWO_HOURS));
        assert!(record.is_expired(t0() + chrono::Duration::hours(3), DAY, TWO_HOURS));
    }

    #[test]
    fn test_absolute_timeout_despite_activity() {
        let mut record = record();
        let late = t0() + chrono::Duration::hours(24) + chrono::Duration::seconds(1);
        record.touch(late - chrono::Duration::minutes(1));
        assert!(record.is_expired(late, DAY, TWO_HOURS));
    }

    #[test]
    fn test_touch_and_activity() {
        let mut record = record();
        record.touch(t0() + chrono::Duration::minutes(30));
        assert_eq!(record.request_count, 1);
        assert!(record.is_recently_active(t0() + chrono::Duration::minutes(34)));
        assert!(!record.is_recently_active(t0() + chrono::Duration::minutes(36)));
        assert_eq!(
            record.idle_time(t0() + chrono::Duration::minutes(40)),
            chrono::Duration::minutes(10)
        );
    }

    #[test]
    fn test_remaining_lifetime() {
        let record = record();
        assert_eq!(
            record.remaining_lifetime(t0() + chrono::Duration::hours(20), DAY),
            Duration::from_secs(4 * 3600)
        );
        assert_eq!(
            record.remaining_lifetime(t0() + chrono::Duration::hours(30), DAY),
            Duration::ZERO
        );
    }

    #[test]
    fn test_reauth_follows_suspicion() {
        let mut record = record();
        assert!(!record.requires_reauth());
        record.suspicious = true;
        assert!(record.requires_reauth());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abcdefghijkl"), "abcdefgh");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_reason_serde() {
        let json = serde_json::to_string(&InvalidationReason::ConcurrentLimit).unwrap();
        assert_eq!(json, "\"concurrent_limit\"");
        assert_eq!(InvalidationReason::IpChurn.to_string(), "ip_churn");
    }
}
