//! Cache counters and point-in-time statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters shared by every cache operation.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub promotions: AtomicU64,
    pub demotions: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.promotions,
            &self.demotions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time cache statistics.
///
/// Sizes and counters are read independently, so a snapshot taken under
/// concurrent load is approximate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hot_size: usize,
    pub warm_size: usize,
    pub cold_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries pushed out of a full tier, whether demoted or dropped.
    pub evictions: u64,
    pub promotions: u64,
    pub demotions: u64,
    /// `hits / (hits + misses)`, 0 before the first request.
    pub hit_ratio: f64,
    /// Estimated false-positive rate of the membership filter at its
    /// current fill.
    pub filter_false_positive_rate: f64,
}

impl CacheStats {
    pub(crate) fn from_parts(sizes: [usize; 3], counters: &Counters, filter_fpr: f64) -> Self {
        let hits = counters.hits.load(Ordering::Relaxed);
        let misses = counters.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        Self {
            hot_size: sizes[0],
            warm_size: sizes[1],
            cold_size: sizes[2],
            hits,
            misses,
            evictions: counters.evictions.load(Ordering::Relaxed),
            promotions: counters.promotions.load(Ordering::Relaxed),
            demotions: counters.demotions.load(Ordering::Relaxed),
            hit_ratio,
            filter_false_positive_rate: filter_fpr,
        }
    }

    /// Entries across all tiers.
    pub fn total_size(&self) -> usize {
        self.hot_size + self.warm_size + self.cold_size
    }

    /// Lookups served, hit or miss.
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio_empty() {
        let stats = CacheStats::from_parts([0, 0, 0], &Counters::default(), 0.0);
        assert_eq!(stats.hit_ratio, 0.0);
        assert_eq!(stats.total_requests(), 0);
    }

    #[test]
    fn test_hit_ratio_and_totals() {
        let counters = Counters::default();
        for _ in 0..3 {
            Counters::bump(&counters.hits);
        }
        Counters::bump(&counters.misses);

        let stats = CacheStats::from_parts([1, 2, 3], &counters, 0.0);
        assert_eq!(stats.hit_ratio, 0.75);
        assert_eq!(stats.total_requests(), 4);
        assert_eq!(stats.total_size(), 6);

        counters.reset();
        let stats = CacheStats::from_parts([0, 0, 0], &counters, 0.0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_serializes_flat() {
        let stats = CacheStats::from_parts([1, 0, 0], &Counters::default(), 0.0);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hot_size"], 1);
        assert_eq!(json["hit_ratio"], 0.0);
    }
}
