//! Configuration system for Stratum.
//!
//! Provides TOML-based configuration with:
//! - Cache tier capacities, TTLs, filter sizing and a prefix routing table
//! - Session limits, timeouts and IP change policy
//! - Maintenance sweep intervals
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, user_config_dir,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
