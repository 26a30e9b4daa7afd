//! Locating and layering `stratum.toml` files.
//!
//! Two layers are read, the later one replacing sections of the earlier:
//! 1. the user file, `$STRATUM_CONFIG_DIR/config.toml` or
//!    `<platform config dir>/stratum/config.toml`
//! 2. the project file, `stratum.toml` in the project directory

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, StratumConfig};

const PROJECT_CONFIG_FILE: &str = "stratum.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "stratum";
const CONFIG_DIR_ENV: &str = "STRATUM_CONFIG_DIR";

/// One candidate config file and whether it contributed.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// Merged configuration plus how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: StratumConfig,
    /// Every candidate file, user layer first.
    pub sources: Vec<ConfigSource>,
    /// Unreadable layers and routing rows that can never match.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Merge the user and project layers. `project_dir` defaults to the
/// working directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], reading the user layer from `config_dir` when given.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = StratumConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_file = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_file {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_file = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_file, &mut warnings));

    check_routes(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Parse a single file, without layering.
pub fn load_config_file(path: &Path) -> Result<StratumConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    StratumConfig::from_toml(&contents)
}

/// The user layer file, if a config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// `$STRATUM_CONFIG_DIR` when set and non-empty, else the platform
/// config dir joined with `stratum`.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge `path` into `config` if it exists. A file that exists but fails to
/// load is reported in `warnings` and skipped.
fn load_layer(config: &mut StratumConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };
    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

/// Report `[[cache.routes]]` rows hidden behind an earlier prefix.
fn check_routes(config: &StratumConfig, warnings: &mut Vec<String>) {
    let Some(cache) = &config.cache else {
        return;
    };
    for route in cache.shadowed_routes() {
        warnings.push(format!(
            "[[cache.routes]] prefix '{}' is shadowed by an earlier, shorter prefix and never matches.",
            route.prefix
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
