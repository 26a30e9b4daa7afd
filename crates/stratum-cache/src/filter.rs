//! Probabilistic membership filter used to short-circuit certain misses.
//!
//! A Bloom filter: `might_contain` never returns `false` for a key that was
//! added (until [`MembershipFilter::clear`]), and only rarely returns `true`
//! for a key that was not.
//!
//! Bit positions come from double hashing, `h1 + i·h2 mod m`, over two
//! independently seeded xxh3 hashes. That family behaves close enough to `k`
//! independent hashes for the target false-positive rate to hold on patterned
//! keys such as `session:<n>`.

use std::f64::consts::LN_2;

use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

use crate::error::{CacheError, Result};

/// Seed of the second hash in the double-hashing family.
const SECOND_HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fixed-size Bloom filter over string keys.
#[derive(Debug, Clone)]
pub struct MembershipFilter {
    words: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl MembershipFilter {
    /// Size a filter for `expected_elements` keys at `false_positive_rate`.
    ///
    /// Uses `m = ceil(-n·ln(p) / ln(2)²)` bits and `k = round(m/n · ln 2)`
    /// hashes (at least one).
    pub fn new(expected_elements: usize, false_positive_rate: f64) -> Result<Self> {
        if expected_elements == 0 {
            return Err(CacheError::ZeroExpectedElements);
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(CacheError::InvalidFalsePositiveRate(false_positive_rate));
        }

        let n = expected_elements as f64;
        let num_bits = (-n * false_positive_rate.ln() / (LN_2 * LN_2)).ceil().max(1.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * LN_2).round().max(1.0) as u32;
        let words = num_bits.div_ceil(64) as usize;

        Ok(Self {
            words: vec![0; words],
            num_bits,
            num_hashes,
        })
    }

    /// Record `key` as present.
    pub fn add(&mut self, key: &str) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = self.position(h1, h2, i);
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// `false` means `key` was definitely never added.
    pub fn might_contain(&self, key: &str) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.num_hashes).all(|i| {
            let bit = self.position(h1, h2, i);
            self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0
        })
    }

    /// Forget every key.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Size of the bit array.
    pub fn bit_count(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash functions applied per key.
    pub fn hash_count(&self) -> u32 {
        self.num_hashes
    }

    /// Fraction of bits currently set.
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.words.iter().map(|w| u64::from(w.count_ones())).sum();
        set as f64 / self.num_bits as f64
    }

    /// False-positive rate implied by the current fill ratio.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powi(self.num_hashes as i32)
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}

/// Two independent hashes of `key`. The second is forced odd so the probe
/// sequence never degenerates to a single position.
fn hash_pair(key: &str) -> (u64, u64) {
    let bytes = key.as_bytes();
    (xxh3_64(bytes), xxh3_64_with_seed(bytes, SECOND_HASH_SEED) | 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fresh_filter_reports_absent() {
        let filter = MembershipFilter::new(1_000, 0.01).unwrap();
        assert!(!filter.might_contain("never-added-key"));
        assert_eq!(filter.fill_ratio(), 0.0);
    }

    #[test]
    fn test_sizing_formula() {
        // n = 1000, p = 0.01 -> m = ceil(9585.06) = 9586, k = round(6.64) = 7
        let filter = MembershipFilter::new(1_000, 0.01).unwrap();
        assert_eq!(filter.bit_count(), 9586);
        assert_eq!(filter.hash_count(), 7);
    }

    #[test]
    fn test_hash_count_at_least_one() {
        let filter = MembershipFilter::new(10, 0.9).unwrap();
        assert!(filter.hash_count() >= 1);
        assert!(filter.bit_count() >= 1);
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        assert_eq!(
            MembershipFilter::new(0, 0.01).unwrap_err(),
            CacheError::ZeroExpectedElements
        );
        assert!(matches!(
            MembershipFilter::new(100, 0.0),
            Err(CacheError::InvalidFalsePositiveRate(_))
        ));
        assert!(matches!(
            MembershipFilter::new(100, 1.0),
            Err(CacheError::InvalidFalsePositiveRate(_))
        ));
    }

    #[test]
    fn test_add_then_contains() {
        let mut filter = MembershipFilter::new(100, 0.01).unwrap();
        filter.add("session:abc");
        assert!(filter.might_contain("session:abc"));
    }

    #[test]
    fn test_clear_resets_bits() {
        let mut filter = MembershipFilter::new(100, 0.01).unwrap();
        filter.add("a");
        filter.add("b");
        assert!(filter.fill_ratio() > 0.0);

        filter.clear();

        assert_eq!(filter.fill_ratio(), 0.0);
        assert!(!filter.might_contain("a"));
    }

    #[test]
    fn test_false_positive_rate_near_target_on_patterned_keys() {
        let mut filter = MembershipFilter::new(10_000, 0.01).unwrap();
        for i in 0..10_000 {
            filter.add(&format!("session:{i}"));
        }

        let false_positives = (10_000..30_000)
            .filter(|i| filter.might_contain(&format!("session:{i}")))
            .count();
        let observed = false_positives as f64 / 20_000.0;

        // Generous bound: three times the target.
        assert!(observed < 0.03, "observed false-positive rate {observed}");
        assert!(filter.estimated_false_positive_rate() < 0.03);
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(keys in proptest::collection::vec(".{0,24}", 1..200)) {
            let mut filter = MembershipFilter::new(keys.len(), 0.05).unwrap();
            for key in &keys {
                filter.add(key);
            }
            for key in &keys {
                prop_assert!(filter.might_contain(key));
            }
        }
    }
}
