//! Per-session origin tracking for hijacking heuristics.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::record::short_id;

/// Where a session came from, plus every IP it has been used from since.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityTrackingRecord {
    pub original_ip: String,
    pub original_user_agent: String,
    pub device_fingerprint: String,

    /// The original IP followed by the IP of every access that came from
    /// elsewhere.
    pub ip_history: Vec<String>,

    /// Number of accesses whose IP differed from the original.
    pub ip_change_count: u32,
}

impl SecurityTrackingRecord {
    pub fn new(
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        device_fingerprint: impl Into<String>,
    ) -> Self {
        let ip = ip.into();
        Self {
            original_ip: ip.clone(),
            original_user_agent: user_agent.into(),
            device_fingerprint: device_fingerprint.into(),
            ip_history: vec![ip],
            ip_change_count: 0,
        }
    }

    /// Record an access from `ip`. Returns `true` if it differs from the
    /// original IP.
    fn observe_ip(&mut self, ip: &str) -> bool {
        if self.original_ip == ip {
            return false;
        }
        self.ip_history.push(ip.to_string());
        self.ip_change_count += 1;
        true
    }
}

/// Result of checking an access against a session's tracked origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityVerdict {
    /// Access is consistent with the session's origin.
    Passed,
    /// No tracking record exists for the session.
    Untracked,
    /// The user agent differs from the one the session was created with.
    UserAgentMismatch,
    /// The IP changed more often than the configured policy allows.
    IpChurn { changes: u32 },
}

impl SecurityVerdict {
    pub fn is_passed(self) -> bool {
        matches!(self, SecurityVerdict::Passed)
    }
}

/// A session whose IP changed suspiciously often.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAnomaly {
    pub session_id: String,
    pub user_id: String,
    pub ip_change_count: u32,
    pub ip_history: Vec<String>,
}

/// Tracking records keyed by session id.
#[derive(Debug, Default)]
pub struct SecurityTracker {
    records: RwLock<HashMap<String, SecurityTrackingRecord>>,
}

impl SecurityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new session.
    pub fn track(&self, session_id: &str, record: SecurityTrackingRecord) {
        self.records.write().insert(session_id.to_string(), record);
    }

    pub fn remove(&self, session_id: &str) -> Option<SecurityTrackingRecord> {
        self.records.write().remove(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<SecurityTrackingRecord> {
        self.records.read().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Check an access from `ip` with `user_agent`.
    ///
    /// A user agent change is a hard failure and leaves the IP history
    /// untouched. An IP change is recorded and only fails once the change
    /// count exceeds `max_ip_changes`.
    pub fn check(
        &self,
        session_id: &str,
        ip: &str,
        user_agent: &str,
        max_ip_changes: Option<u32>,
    ) -> SecurityVerdict {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(session_id) else {
            return SecurityVerdict::Untracked;
        };

        if record.original_user_agent != user_agent {
            return SecurityVerdict::UserAgentMismatch;
        }

        if record.observe_ip(ip) {
            debug!(
                session = %short_id(session_id),
                ip = %ip,
                changes = record.ip_change_count,
                "Session accessed from a different IP"
            );
        }

        match max_ip_changes {
            Some(max) if record.ip_change_count > max => SecurityVerdict::IpChurn {
                changes: record.ip_change_count,
            },
            _ => SecurityVerdict::Passed,
        }
    }

    /// Sessions whose IP change count exceeds `threshold`, with their
    /// change count and history.
    pub fn exceeding(&self, threshold: u32) -> Vec<(String, SecurityTrackingRecord)> {
        self.records
            .read()
            .iter()
            .filter(|(_, record)| record.ip_change_count > threshold)
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }
}
