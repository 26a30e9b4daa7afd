//! Devices seen across sessions, keyed by client fingerprint.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// A client device and the live sessions it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub fingerprint: String,

    /// User agent of the first session from this device.
    pub user_agent: String,

    pub last_known_ip: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub session_ids: BTreeSet<String>,
}

/// Registry of devices with at least one live session.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `session_id` to the device, creating it on first sight.
    pub fn register(
        &self,
        fingerprint: &str,
        session_id: &str,
        user_agent: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) {
        let mut devices = self.devices.write();
        let device = devices
            .entry(fingerprint.to_string())
            .or_insert_with(|| DeviceRecord {
                fingerprint: fingerprint.to_string(),
                user_agent: user_agent.to_string(),
                last_known_ip: ip.to_string(),
                first_seen: now,
                last_seen: now,
                session_ids: BTreeSet::new(),
            });
        device.last_known_ip = ip.to_string();
        device.last_seen = now;
        device.session_ids.insert(session_id.to_string());
    }

    /// Refresh a device on a validated access.
    pub fn touch(&self, fingerprint: &str, ip: &str, now: DateTime<Utc>) {
        if let Some(device) = self.devices.write().get_mut(fingerprint) {
            device.last_known_ip = ip.to_string();
            device.last_seen = now;
        }
    }

    /// Detach `session_id`; the device is dropped once it has no sessions.
    pub fn detach(&self, fingerprint: &str, session_id: &str) {
        let mut devices = self.devices.write();
        if let Some(device) = devices.get_mut(fingerprint) {
            device.session_ids.remove(session_id);
            if device.session_ids.is_empty() {
                devices.remove(fingerprint);
            }
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<DeviceRecord> {
        self.devices.read().get(fingerprint).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_register_and_refresh() {
        let registry = DeviceRegistry::new();
        registry.register("fp", "s1", "UA-1", "10.0.0.1", t0());
        registry.register("fp", "s2", "UA-2", "10.0.0.2", t0() + chrono::Duration::minutes(1));

        let device = registry.get("fp").unwrap();
        assert_eq!(device.user_agent, "UA-1");
        assert_eq!(device.last_known_ip, "10.0.0.2");
        assert_eq!(device.first_seen, t0());
        assert_eq!(device.session_ids.len(), 2);

        registry.touch("fp", "10.0.0.3", t0() + chrono::Duration::minutes(5));
        let device = registry.get("fp").unwrap();
        assert_eq!(device.last_known_ip, "10.0.0.3");
        assert_eq!(device.last_seen, t0() + chrono::Duration::minutes(5));
    }

    #[test]
    fn test_dropped_with_last_session() {
        let registry = DeviceRegistry::new();
        registry.register("fp", "s1", "UA", "10.0.0.1", t0());
        registry.register("fp", "s2", "UA", "10.0.0.1", t0());

        registry.detach("fp", "s1");
        assert_eq!(registry.len(), 1);

        registry.detach("fp", "s2");
        assert!(registry.is_empty());
        assert!(registry.get("fp").is_none());
    }
}
