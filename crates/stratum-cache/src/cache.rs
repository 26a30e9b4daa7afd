//! Three-tier cache with a membership filter in front.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use stratum_types::{SharedClock, SystemClock, Tier};
use tracing::{debug, info, trace};

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, DEFAULT_PRIORITY};
use crate::error::Result;
use crate::filter::MembershipFilter;
use crate::key::CacheKey;
use crate::router::{PrefixRouter, TierRouter};
use crate::stats::{CacheStats, Counters};
use crate::store::{TierStore, new_store};

type TierLock = RwLock<Box<dyn TierStore>>;

struct CacheInner {
    config: CacheConfig,

    /// Indexed by `Tier as usize`; locked in that order.
    tiers: [TierLock; 3],

    filter: RwLock<MembershipFilter>,

    router: Box<dyn TierRouter>,

    clock: SharedClock,

    counters: Counters,
}

/// Hot/Warm/Cold in-process cache.
///
/// Keys are routed to an initial tier on `put`, climb one tier per hit, and
/// slide one tier colder when evicted from a full tier by an entry that
/// deserves the slot more. A membership filter answers definite misses
/// without touching any tier.
///
/// Every key lives in at most one tier. Cloning is cheap and clones share
/// the same storage.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<CacheInner>,
}

impl TieredCache {
    /// Create a cache with the default prefix routing table and the system
    /// clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_parts(config, PrefixRouter::default(), SystemClock::shared())
    }

    /// Create a cache with a custom router and clock.
    pub fn with_parts(
        config: CacheConfig,
        router: impl TierRouter + 'static,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;
        let filter = MembershipFilter::new(
            config.filter_expected_elements,
            config.filter_false_positive_rate,
        )?;
        let tiers = Tier::ALL.map(|tier| RwLock::new(new_store(tier, config.tier(tier).capacity)));

        debug!(
            hot = config.hot.capacity,
            warm = config.warm.capacity,
            cold = config.cold.capacity,
            filter_bits = filter.bit_count(),
            filter_hashes = filter.hash_count(),
            "Tiered cache created"
        );

        Ok(Self {
            inner: Arc::new(CacheInner {
                config,
                tiers,
                filter: RwLock::new(filter),
                router: Box::new(router),
                clock,
                counters: Counters::default(),
            }),
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Look up `key`, promoting it one tier on a Warm or Cold hit.
    ///
    /// # Panics
    ///
    /// Panics if the value under `key` was stored as a type other than `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone,
    {
        let inner = &self.inner;
        if !inner.filter.read().might_contain(key) {
            Counters::bump(&inner.counters.misses);
            trace!(key = %key, "Filter miss");
            return None;
        }

        let now = inner.clock.now();
        match inner.lookup(key, now) {
            Some(entry) => {
                Counters::bump(&inner.counters.hits);
                Some(entry.value_as(key))
            }
            None => {
                Counters::bump(&inner.counters.misses);
                trace!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Store `value` under `key` in its routed tier.
    ///
    /// Without a TTL the routed tier's default applies. Any copy of the key
    /// in another tier is removed.
    pub fn put<T>(&self, key: impl Into<String>, value: T, ttl: Option<Duration>)
    where
        T: Any + Send + Sync,
    {
        self.put_with_priority(key, value, ttl, DEFAULT_PRIORITY);
    }

    /// Like [`put`](Self::put) with an explicit eviction priority.
    pub fn put_with_priority<T>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Duration>,
        priority: u8,
    ) where
        T: Any + Send + Sync,
    {
        let key = key.into();
        let inner = &self.inner;
        let tier = inner.router.route(&key);
        let ttl = ttl.unwrap_or(inner.config.tier(tier).default_ttl);
        let now = inner.clock.now();
        let mut entry = CacheEntry::new(value, now, ttl, priority);

        // Filter and tiers change together, under the tier locks.
        let mut tiers = inner.lock_all();
        inner.filter.write().add(&key);
        if let Some((_, previous)) = tiers.take(&key)
            && !previous.is_expired(now)
        {
            entry.inherit_history(&previous);
        }
        trace!(key = %key, tier = %tier, ttl_secs = ttl.as_secs(), "Stored");
        tiers.place(tier, key, entry, now, &inner.counters);
    }

    /// Typed variant of [`get`](Self::get).
    pub fn get_typed<T>(&self, key: &CacheKey<T>) -> Option<T>
    where
        T: Any + Clone,
    {
        self.get(key.as_str())
    }

    /// Typed variant of [`put`](Self::put).
    pub fn put_typed<T>(&self, key: &CacheKey<T>, value: T, ttl: Option<Duration>)
    where
        T: Any + Send + Sync,
    {
        self.put(key.as_str(), value, ttl);
    }

    /// Remove `key` from whichever tier holds it.
    ///
    /// Returns `true` if an entry was removed. The membership filter cannot
    /// forget keys, so later lookups of `key` still probe the tiers.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.lock_all().take(key);
        if let Some((tier, _)) = &removed {
            trace!(key = %key, tier = %tier, "Removed");
        }
        removed.is_some()
    }

    /// Whether a live entry exists for `key`. Does not count as an access.
    pub fn contains(&self, key: &str) -> bool {
        self.tier_of(key).is_some()
    }

    /// Tier currently holding a live entry for `key`. Does not count as an
    /// access.
    pub fn tier_of(&self, key: &str) -> Option<Tier> {
        let now = self.inner.clock.now();
        Tier::ALL.into_iter().find(|tier| {
            self.inner.tiers[*tier as usize]
                .read()
                .peek(key)
                .is_some_and(|entry| !entry.is_expired(now))
        })
    }

    /// Number of entries across all tiers, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.tiers.iter().map(|tier| tier.read().len()).sum()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty every tier and reset the filter and counters.
    pub fn clear_all(&self) {
        let inner = &self.inner;
        let mut tiers = inner.lock_all();
        for tier in Tier::ALL {
            tiers.store(tier).clear();
        }
        inner.filter.write().clear();
        inner.counters.reset();
        info!("Cache cleared");
    }

    /// Drop expired entries from every tier.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut removed = 0;
        for tier in Tier::ALL {
            let purged = self.inner.tiers[tier as usize].write().purge_expired(now);
            if purged > 0 {
                trace!(tier = %tier, purged, "Purged expired entries");
            }
            removed += purged;
        }
        if removed > 0 {
            debug!(removed, "Cleaned up expired cache entries");
        }
        removed
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        let sizes = Tier::ALL.map(|tier| inner.tiers[tier as usize].read().len());
        let filter_fpr = inner.filter.read().estimated_false_positive_rate();
        CacheStats::from_parts(sizes, &inner.counters, filter_fpr)
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .finish_non_exhaustive()
    }
}

impl CacheInner {
    fn lock_all(&self) -> LockedTiers<'_> {
        let [hot, warm, cold] = &self.tiers;
        LockedTiers([hot.write(), warm.write(), cold.write()])
    }

    /// Find a live entry for `key`, recording the hit.
    fn lookup(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        {
            let mut hot = self.tiers[Tier::Hot as usize].write();
            match hot.peek(key).map(|entry| entry.is_expired(now)) {
                Some(false) => return hot.hit(key, now).cloned(),
                Some(true) => {
                    hot.remove(key);
                    trace!(key = %key, "Dropped expired hot entry");
                    return None;
                }
                None => {}
            }
        }

        for source in [Tier::Warm, Tier::Cold] {
            let expired = self.tiers[source as usize]
                .read()
                .peek(key)
                .map(|entry| entry.is_expired(now));
            match expired {
                Some(false) => return self.promote(key, now),
                // Left for the maintenance sweep.
                Some(true) => return None,
                None => {}
            }
        }
        None
    }

    /// Move `key` one tier hotter and record the hit.
    ///
    /// The entry may have moved since it was probed, so it is located again
    /// under the write locks.
    fn promote(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let mut tiers = self.lock_all();
        let source = tiers.locate(key)?;
        if source == Tier::Hot {
            let entry = tiers.store(Tier::Hot).hit(key, now)?.clone();
            return (!entry.is_expired(now)).then_some(entry);
        }

        let mut entry = tiers.store(source).remove(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.record_access(now);
        let snapshot = entry.clone();

        let destination = source.hotter();
        tiers.place(destination, key.to_string(), entry, now, &self.counters);
        Counters::bump(&self.counters.promotions);
        debug!(key = %key, from = %source, to = %destination, "Promoted");
        Some(snapshot)
    }
}

/// Write guards on all three tiers, taken hottest first.
struct LockedTiers<'a>([RwLockWriteGuard<'a, Box<dyn TierStore>>; 3]);

impl LockedTiers<'_> {
    fn store(&mut self, tier: Tier) -> &mut dyn TierStore {
        &mut **self.0[tier as usize]
    }

    fn locate(&self, key: &str) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|tier| self.0[*tier as usize].contains(key))
    }

    /// Remove `key` from whichever tier holds it.
    fn take(&mut self, key: &str) -> Option<(Tier, CacheEntry)> {
        let tier = self.locate(key)?;
        self.store(tier).remove(key).map(|entry| (tier, entry))
    }

    /// Insert into `tier`, evicting first when full.
    ///
    /// An evicted entry the tier's policy wants to keep is inserted one tier
    /// colder, which may in turn evict from that tier.
    fn place(
        &mut self,
        tier: Tier,
        key: String,
        entry: CacheEntry,
        now: DateTime<Utc>,
        counters: &Counters,
    ) {
        let mut pending = Some((tier, key, entry));
        while let Some((tier, key, entry)) = pending.take() {
            let store = self.store(tier);
            if store.is_full() && !store.contains(&key) {
                if let Some((victim_key, victim)) = store.evict(now) {
                    Counters::bump(&counters.evictions);
                    let temperature = victim.temperature(now);
                    match tier.colder() {
                        Some(colder) if store.demotes(&victim) && !victim.is_expired(now) => {
                            Counters::bump(&counters.demotions);
                            debug!(key = %victim_key, from = %tier, to = %colder, %temperature, "Demoted");
                            pending = Some((colder, victim_key, victim));
                        }
                        _ => debug!(key = %victim_key, tier = %tier, %temperature, "Evicted"),
                    }
                }
            }
            store.insert(key, entry);
        }
    }
}
