//! Per-tier storage and eviction policies.
//!
//! Each tier is a key → [`CacheEntry`] map plus whatever ordering structure
//! its policy needs:
//!
//! | tier | ordering | victim | demotes when |
//! |------|----------|--------|--------------|
//! | Hot  | access order (LRU) | least recently used | accessed more than once |
//! | Warm | none, scored on demand | lowest eviction score | accessed at least once |
//! | Cold | insertion order (FIFO) | oldest insertion | never |

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lru::LruCache;
use stratum_types::Tier;

use crate::entry::CacheEntry;

/// Storage for a single tier.
pub(crate) trait TierStore: Send + Sync {
    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    /// Look at an entry without touching its metadata or ordering.
    fn peek(&self, key: &str) -> Option<&CacheEntry>;

    /// Record a hit on `key` and return the updated entry.
    fn hit(&mut self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry>;

    /// Insert or replace an entry, returning the replaced one.
    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry>;

    fn remove(&mut self, key: &str) -> Option<CacheEntry>;

    /// Remove and return the victim chosen by this tier's policy.
    fn evict(&mut self, now: DateTime<Utc>) -> Option<(String, CacheEntry)>;

    /// Whether an evicted entry is worth keeping one tier colder.
    fn demotes(&self, entry: &CacheEntry) -> bool;

    /// Drop every entry expired at `now`, returning how many were dropped.
    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize;

    fn clear(&mut self);

    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}

/// Build the store for `tier`.
pub(crate) fn new_store(tier: Tier, capacity: usize) -> Box<dyn TierStore> {
    match tier {
        Tier::Hot => Box::new(LruStore::new(capacity)),
        Tier::Warm => Box::new(ScoredStore::new(capacity)),
        Tier::Cold => Box::new(FifoStore::new(capacity)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hot: LRU
// ─────────────────────────────────────────────────────────────────────────────

/// Access-ordered store. Hits move the key to the most-recent end.
pub(crate) struct LruStore {
    entries: LruCache<String, CacheEntry>,
    capacity: usize,
}

impl LruStore {
    fn new(capacity: usize) -> Self {
        // Capacity is enforced by the cache so evictions can be demoted.
        Self {
            entries: LruCache::unbounded(),
            capacity,
        }
    }
}

impl TierStore for LruStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    fn hit(&mut self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(key)?;
        entry.record_access(now);
        Some(&*entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.put(key, entry)
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    fn evict(&mut self, _now: DateTime<Utc>) -> Option<(String, CacheEntry)> {
        self.entries.pop_lru()
    }

    fn demotes(&self, entry: &CacheEntry) -> bool {
        entry.access_count > 1
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        purge_lru(&mut self.entries, now)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Warm: lowest eviction score
// ─────────────────────────────────────────────────────────────────────────────

/// Score-ordered store.
///
/// Scores depend on the current time, so the order is computed at eviction
/// time instead of being cached in a heap that would go stale.
pub(crate) struct ScoredStore {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
}

impl ScoredStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    fn lowest_scored(&self, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .iter()
            .min_by(|(ka, a), (kb, b)| {
                a.eviction_score(now)
                    .total_cmp(&b.eviction_score(now))
                    .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
                    .then_with(|| ka.cmp(kb))
            })
            .map(|(key, _)| key.clone())
    }
}

impl TierStore for ScoredStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    fn hit(&mut self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(key)?;
        entry.record_access(now);
        Some(&*entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(key, entry)
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    fn evict(&mut self, now: DateTime<Utc>) -> Option<(String, CacheEntry)> {
        let key = self.lowest_scored(now)?;
        self.entries.remove_entry(&key)
    }

    fn demotes(&self, entry: &CacheEntry) -> bool {
        entry.access_count > 0
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cold: FIFO
// ─────────────────────────────────────────────────────────────────────────────

/// Insertion-ordered store.
///
/// Backed by an LRU list that is only ever read with `peek`, so the order it
/// keeps is the order of insertion.
pub(crate) struct FifoStore {
    entries: LruCache<String, CacheEntry>,
    capacity: usize,
}

impl FifoStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
        }
    }
}

impl TierStore for FifoStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    fn hit(&mut self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let entry = self.entries.peek_mut(key)?;
        entry.record_access(now);
        Some(&*entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.put(key, entry)
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    fn evict(&mut self, _now: DateTime<Utc>) -> Option<(String, CacheEntry)> {
        self.entries.pop_lru()
    }

    fn demotes(&self, _entry: &CacheEntry) -> bool {
        false
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        purge_lru(&mut self.entries, now)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

fn purge_lru(entries: &mut LruCache<String, CacheEntry>, now: DateTime<Utc>) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key);
    }
    expired.len()
}
