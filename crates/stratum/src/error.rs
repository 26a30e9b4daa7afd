//! Error types for the stratum facade.

use thiserror::Error;

/// Result type alias using the facade error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building the cache and session registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] stratum_config::ConfigError),

    #[error(transparent)]
    Cache(#[from] stratum_cache::CacheError),

    #[error(transparent)]
    Session(#[from] stratum_session::SessionError),
}
