//! Error types for cache construction.
//!
//! Lookups never fail: a miss is `None`. The only fallible operations are the
//! constructors, which reject nonsensical bounds up front.

/// Error type for cache construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// Membership filter sized for zero elements.
    #[error("membership filter expected_elements must be greater than zero")]
    ZeroExpectedElements,

    /// False-positive rate outside the open interval (0, 1).
    #[error("membership filter false_positive_rate must be in (0, 1), got {0}")]
    InvalidFalsePositiveRate(f64),

    /// A tier was configured with no room for entries.
    #[error("{tier} tier capacity must be greater than zero")]
    ZeroCapacity { tier: &'static str },

    /// A tier was configured with a zero default TTL.
    #[error("{tier} tier default TTL must be greater than zero")]
    ZeroTtl { tier: &'static str },
}

/// Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
