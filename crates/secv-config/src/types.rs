//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source tag for the local tools directory.
pub const LOCAL_SOURCE: &str = "local";

/// Root configuration.
///
/// Sections are optional so that a layer only overrides what it mentions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecvConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<ModulesConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows: Option<WorkflowsConfig>,

    /// External module repositories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl SecvConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections present in `other` replace ours wholesale. Repositories are
    /// merged by name.
    pub fn merge(&mut self, other: SecvConfig) {
        if other.modules.is_some() {
            self.modules = other.modules;
        }
        if other.workflows.is_some() {
            self.workflows = other.workflows;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
        for repo in other.repositories {
            match self.repositories.iter_mut().find(|r| r.name == repo.name) {
                Some(existing) => *existing = repo,
                None => self.repositories.push(repo),
            }
        }
    }

    /// Every directory the registry should scan, in precedence order.
    ///
    /// Configured roots come first (default: `tools` as `local`), followed
    /// by the `tools/` directory of each enabled repository, tagged with the
    /// repository name.
    pub fn module_roots(&self) -> Vec<RootConfig> {
        let mut roots = match &self.modules {
            Some(modules) if !modules.roots.is_empty() => modules.roots.clone(),
            _ => vec![RootConfig::local("tools")],
        };

        roots.extend(
            self.repositories
                .iter()
                .filter(|r| r.enabled)
                .map(|r| RootConfig {
                    path: r.path.join("tools"),
                    source: r.name.clone(),
                }),
        );
        roots
    }

    /// Effective workflow settings.
    pub fn workflows(&self) -> WorkflowsConfig {
        self.workflows.clone().unwrap_or_default()
    }

    /// Effective logging settings.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// `[modules]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub roots: Vec<RootConfig>,
}

/// A directory tree scanned for `module.json` files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: PathBuf,
    /// Provenance tag for modules under this root.
    #[serde(default = "default_source")]
    pub source: String,
}

impl RootConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: LOCAL_SOURCE.to_string(),
        }
    }
}

fn default_source() -> String {
    LOCAL_SOURCE.to_string()
}

/// `[workflows]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// Where named workflows are looked up.
    pub dir: PathBuf,
    /// Upper bound on how long `secv workflow` waits for completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("workflows"),
            wait_timeout_secs: None,
        }
    }
}

/// A `[[repositories]]` entry.
///
/// The repository is assumed to be synced to `path` already; its modules
/// live under `path/tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Write a daily-rotated JSON log file.
    pub json_file: bool,
    /// Log directory; defaults to `<config_dir>/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: true,
            dir: None,
        }
    }
}
