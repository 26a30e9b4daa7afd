//! Concurrent session registry.
//!
//! This crate tracks authenticated sessions with:
//! - A per-user session ceiling that evicts the oldest session
//! - Absolute and idle timeouts
//! - Origin tracking: user agent changes fail validation, IP changes are
//!   recorded and optionally capped
//! - A device registry keyed by client fingerprint
//! - Session copies in a [`stratum_cache::TieredCache`] for fast reads
//!
//! # Example
//!
//! ```rust,ignore
//! use stratum_session::{SessionConfig, SessionRegistry};
//!
//! let registry = SessionRegistry::new(SessionConfig::default(), cache)?;
//! let id = registry.create_session("u1", "alice", "customer", "fp", "10.0.0.1", ua);
//! let session = registry.validate_session(&id, "10.0.0.1", ua);
//! ```

mod config;
mod device;
mod error;
mod record;
mod registry;
mod security;

pub use config::SessionConfig;
pub use device::{DeviceRecord, DeviceRegistry};
pub use error::{Result, SessionError};
pub use record::{InvalidationReason, SessionRecord};
pub use registry::{SESSION_KEY_PREFIX, SessionRegistry, SessionStats};
pub use security::{SecurityAnomaly, SecurityTracker, SecurityTrackingRecord, SecurityVerdict};
