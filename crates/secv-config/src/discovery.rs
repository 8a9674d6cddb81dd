//! Config file discovery and layered merging.
//!
//! Layers, lowest precedence first:
//! 1. `config.toml` in the user config directory (`$SECV_CONFIG_DIR`, or
//!    `<platform config dir>/secv`)
//! 2. `secv.toml` in the project directory (the working directory by default)
//!
//! Command-line flags sit on top and are applied by the CLI.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SecvConfig};

const APP_NAME: &str = "secv";
const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "secv.toml";
const CONFIG_DIR_ENV: &str = "SECV_CONFIG_DIR";

/// What happened to one config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerState {
    /// No file at the path.
    Absent,
    /// Read and merged.
    Applied,
    /// Present but unreadable or malformed; skipped.
    Skipped(String),
}

/// One config file considered during discovery.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub path: PathBuf,
    pub state: LayerState,
}

/// The merged configuration plus a record of every layer that fed it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SecvConfig,
    /// Lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

impl LoadedConfig {
    /// Files that contributed to the merged config.
    pub fn applied(&self) -> impl Iterator<Item = &Path> {
        self.layers
            .iter()
            .filter(|l| l.state == LayerState::Applied)
            .map(|l| l.path.as_path())
    }

    /// One message per skipped layer.
    pub fn warnings(&self) -> impl Iterator<Item = String> + '_ {
        self.layers.iter().filter_map(|l| match &l.state {
            LayerState::Skipped(reason) => {
                Some(format!("ignoring config {}: {reason}", l.path.display()))
            }
            _ => None,
        })
    }
}

/// Discover and merge the user and project layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with the user config directory given explicitly.
///
/// `user_dir` wins over `SECV_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    user_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user = user_dir
        .map(|d| d.join(USER_FILE))
        .or_else(config_path);
    let project = project_dir.unwrap_or(Path::new(".")).join(PROJECT_FILE);

    let mut loaded = LoadedConfig {
        config: SecvConfig::new(),
        layers: Vec::new(),
    };
    for path in user.into_iter().chain([project]) {
        let state = match read_layer(&path) {
            Ok(None) => LayerState::Absent,
            Ok(Some(layer)) => {
                loaded.config.merge(layer);
                LayerState::Applied
            }
            Err(e) => LayerState::Skipped(e.to_string()),
        };
        loaded.layers.push(ConfigLayer { path, state });
    }
    Ok(loaded)
}

/// Parse one config file. `Ok(None)` when there is no file.
pub fn read_layer(path: &Path) -> Result<Option<SecvConfig>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    SecvConfig::from_toml(&text).map(Some)
}

/// `$SECV_CONFIG_DIR` if set and non-empty, else `<platform config dir>/secv`.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// The user config file inside [`config_dir`].
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_FILE))
}

/// Default log directory, `<config_dir>/logs`.
pub fn log_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("logs"))
}
