//! Hot/Warm/Cold in-process cache.
//!
//! This crate provides a three-tier cache for heterogeneous values with:
//! - A membership filter that answers definite misses without locking a tier
//! - Per-tier eviction: LRU (hot), lowest eviction score (warm), FIFO (cold)
//! - Promotion one tier up on every warm or cold hit
//! - Demotion of evicted entries that were read, instead of dropping them
//! - Per-entry TTL with per-tier defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use stratum_cache::{CacheConfig, TieredCache};
//!
//! let cache = TieredCache::new(CacheConfig::default())?;
//! cache.put("session:abc", profile, None);
//! let profile: Option<Profile> = cache.get("session:abc");
//! ```

mod cache;
mod config;
mod entry;
mod error;
mod filter;
mod key;
mod router;
mod stats;
mod store;

pub use cache::TieredCache;
pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedValue, DEFAULT_PRIORITY};
pub use error::{CacheError, Result};
pub use filter::MembershipFilter;
pub use key::CacheKey;
pub use router::{PrefixRouter, TierRouter};
pub use stats::CacheStats;
pub use stratum_types::Tier;
