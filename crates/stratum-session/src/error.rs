//! Error types for session registry construction.

/// Error type for session registry construction.
///
/// Validation outcomes are not errors: a rejected session is `None` from
/// [`SessionRegistry::validate_session`](crate::SessionRegistry::validate_session).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// A user could never hold a session.
    #[error("max_sessions_per_user must be greater than zero")]
    ZeroSessionLimit,

    /// A timeout of zero would expire every session on creation.
    #[error("{which} timeout must be greater than zero")]
    ZeroTimeout { which: &'static str },

    /// The idle timeout can never trigger.
    #[error("idle timeout ({idle_secs}s) exceeds absolute timeout ({absolute_secs}s)")]
    IdleExceedsAbsolute { idle_secs: u64, absolute_secs: u64 },
}

/// Result type for session registry construction.
pub type Result<T> = std::result::Result<T, SessionError>;
