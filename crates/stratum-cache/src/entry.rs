//! Cache entry with the access metadata every tier evicts by.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stratum_types::Tier;

/// Half-life-ish decay constant of the frequency score (5 minutes).
const FREQUENCY_DECAY_MS: f64 = 5.0 * 60.0 * 1000.0;

/// Priority given to entries stored without one.
pub const DEFAULT_PRIORITY: u8 = 1;

/// Type-erased cached value.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Entry stored in a cache tier.
#[derive(Clone)]
pub struct CacheEntry {
    /// Cached value.
    value: CachedValue,

    /// Type name of the stored value, for mismatch diagnostics.
    type_name: &'static str,

    /// The entry is dead once this instant has passed.
    pub expires_at: DateTime<Utc>,

    /// When the key was first stored.
    pub created_at: DateTime<Utc>,

    /// Last hit (or insertion, before the first hit).
    pub last_accessed_at: DateTime<Utc>,

    /// Number of hits.
    pub access_count: u64,

    /// Exponentially decayed hit frequency.
    pub frequency: f64,

    /// Eviction tie-breaker; higher survives longer.
    pub priority: u8,
}

impl CacheEntry {
    /// Create an entry holding `value` that expires `ttl` after `now`.
    pub fn new<T>(value: T, now: DateTime<Utc>, ttl: Duration, priority: u8) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            expires_at: expiry(now, ttl),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            frequency: 0.0,
            priority,
        }
    }

    /// Whether the entry is dead at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Record a hit at `now`.
    ///
    /// The frequency score decays by the time elapsed since the previous
    /// access before the new hit is counted.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_accessed_at).num_milliseconds().max(0) as f64;
        let decay = (-elapsed_ms / FREQUENCY_DECAY_MS).exp();
        self.frequency = self.frequency * decay + 1.0;
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    /// `0.4·frequency + 0.4·recency + 0.2·priority`, where
    /// `recency = 1 / (1 + minutes since last access)`.
    pub fn eviction_score(&self, now: DateTime<Utc>) -> f64 {
        let age_minutes = (now - self.last_accessed_at).num_milliseconds().max(0) as f64 / 60_000.0;
        let recency = 1.0 / (1.0 + age_minutes);
        self.frequency * 0.4 + recency * 0.4 + f64::from(self.priority) * 0.2
    }

    /// Tier the entry's access pattern suggests, independent of where it lives.
    pub fn temperature(&self, now: DateTime<Utc>) -> Tier {
        let idle = now - self.last_accessed_at;
        if self.frequency > 10.0 && idle < chrono::Duration::minutes(5) {
            Tier::Hot
        } else if self.frequency > 2.0 && idle < chrono::Duration::minutes(30) {
            Tier::Warm
        } else {
            Tier::Cold
        }
    }

    /// Carry the access history of the entry this one replaces.
    pub fn inherit_history(&mut self, previous: &CacheEntry) {
        self.created_at = previous.created_at;
        self.last_accessed_at = previous.last_accessed_at;
        self.access_count = previous.access_count;
        self.frequency = previous.frequency;
    }

    /// Name of the stored value's type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Clone the value out as `T`.
    ///
    /// # Panics
    ///
    /// Panics when the value was stored as a different type: two callers are
    /// using the same key for unrelated data.
    pub fn value_as<T>(&self, key: &str) -> T
    where
        T: Any + Clone,
    {
        match self.value.downcast_ref::<T>() {
            Some(value) => value.clone(),
            None => panic!(
                "cache key '{key}' holds a value of type {} but was read as {}",
                self.type_name,
                std::any::type_name::<T>()
            ),
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("type_name", &self.type_name)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("last_accessed_at", &self.last_accessed_at)
            .field("access_count", &self.access_count)
            .field("frequency", &self.frequency)
            .field("priority", &self.priority)
            .finish()
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn minutes(n: i64) -> chrono::Duration {
        chrono::Duration::minutes(n)
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = CacheEntry::new(1u32, t0(), Duration::from_secs(60), DEFAULT_PRIORITY);
        assert!(!entry.is_expired(t0() + chrono::Duration::seconds(60)));
        assert!(entry.is_expired(t0() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new(1u32, t0(), Duration::MAX, DEFAULT_PRIORITY);
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_record_access_counts_and_decays() {
        let mut entry = CacheEntry::new("v", t0(), Duration::from_secs(3600), DEFAULT_PRIORITY);

        entry.record_access(t0());
        assert_eq!(entry.access_count, 1);
        assert!((entry.frequency - 1.0).abs() < 1e-9);

        // Five minutes later the previous score has decayed by 1/e.
        entry.record_access(t0() + minutes(5));
        assert_eq!(entry.access_count, 2);
        let expected = (-1.0f64).exp() + 1.0;
        assert!((entry.frequency - expected).abs() < 1e-9);
        assert_eq!(entry.last_accessed_at, t0() + minutes(5));
    }

    #[test]
    fn test_eviction_score_weights() {
        let entry = CacheEntry::new("v", t0(), Duration::from_secs(3600), 1);
        // frequency 0, recency 1, priority 1
        assert!((entry.eviction_score(t0()) - 0.6).abs() < 1e-9);
        // one minute idle halves recency
        assert!((entry.eviction_score(t0() + minutes(1)) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_frequent_entry_scores_higher() {
        let idle = CacheEntry::new("a", t0(), Duration::from_secs(3600), 1);
        let mut busy = CacheEntry::new("b", t0(), Duration::from_secs(3600), 1);
        for _ in 0..5 {
            busy.record_access(t0());
        }
        assert!(busy.eviction_score(t0()) > idle.eviction_score(t0()));
    }

    #[test]
    fn test_temperature() {
        let mut entry = CacheEntry::new("v", t0(), Duration::from_secs(3600), 1);
        assert_eq!(entry.temperature(t0()), Tier::Cold);

        for _ in 0..3 {
            entry.record_access(t0());
        }
        assert_eq!(entry.temperature(t0()), Tier::Warm);

        for _ in 0..10 {
            entry.record_access(t0());
        }
        assert_eq!(entry.temperature(t0()), Tier::Hot);
        assert_eq!(entry.temperature(t0() + minutes(10)), Tier::Warm);
        assert_eq!(entry.temperature(t0() + minutes(45)), Tier::Cold);
    }

    #[test]
    fn test_inherit_history() {
        let mut old = CacheEntry::new("old", t0(), Duration::from_secs(60), 1);
        old.record_access(t0() + minutes(1));
        old.record_access(t0() + minutes(2));

        let mut new = CacheEntry::new("new", t0() + minutes(3), Duration::from_secs(60), 4);
        new.inherit_history(&old);

        assert_eq!(new.access_count, 2);
        assert_eq!(new.created_at, t0());
        assert_eq!(new.priority, 4);
        assert_eq!(new.value_as::<&str>("k"), "new");
    }

    #[test]
    fn test_value_as_round_trip() {
        let entry = CacheEntry::new(vec![1u8, 2, 3], t0(), Duration::from_secs(60), 1);
        assert_eq!(entry.value_as::<Vec<u8>>("bytes"), vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "cache key 'bytes' holds a value of type")]
    fn test_value_as_wrong_type_panics() {
        let entry = CacheEntry::new(vec![1u8, 2, 3], t0(), Duration::from_secs(60), 1);
        let _: String = entry.value_as("bytes");
    }
}
