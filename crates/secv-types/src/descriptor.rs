//! Module descriptors and per-OS executable selection.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Timeout applied when a manifest does not declare one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Provenance tag for modules found under the local tools directory.
pub const LOCAL_SOURCE: &str = "local";

/// A validated module, ready to be executed.
///
/// Descriptors are produced by the registry from `module.json` manifests.
/// `name` is unique within one registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Flat command used on every OS without a dedicated entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// OS identifier → command.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub executables_by_os: BTreeMap<String, String>,
    /// Advisory only; never checked before execution.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub timeout_secs: u64,
    /// Advisory hint that the module is safe to run alongside others.
    #[serde(default)]
    pub concurrent: bool,
    /// Directory containing the manifest. Used as the working directory.
    pub module_dir: PathBuf,
    /// `local` or the name of the external source the module came from.
    pub source: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub inputs: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub outputs: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<ModuleHelp>,
}

impl ModuleDescriptor {
    /// Create a descriptor with a flat executable and default settings.
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<String>,
        module_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            category: String::new(),
            description: String::new(),
            author: String::new(),
            executable: Some(executable.into()),
            executables_by_os: BTreeMap::new(),
            dependencies: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrent: false,
            module_dir: module_dir.into(),
            source: LOCAL_SOURCE.to_string(),
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            help: None,
        }
    }

    /// Set the declared timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a per-OS command.
    pub fn with_os_executable(mut self, os: impl Into<String>, command: impl Into<String>) -> Self {
        self.executables_by_os.insert(os.into(), command.into());
        self
    }

    /// Whether this module came from the local tools directory.
    pub fn is_local(&self) -> bool {
        self.source == LOCAL_SOURCE
    }

    /// Resolve the command for `os`. See [`resolve_executable`].
    pub fn command_for(&self, os: &str) -> Option<&str> {
        resolve_executable(os, self)
    }
}

/// Free-form help carried from the manifest for display purposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleHelp {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterHelp>,
    #[serde(default)]
    pub examples: Vec<ExampleHelp>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Documentation for a single module parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterHelp {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A usage example.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleHelp {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// OS identifier of the running process (`linux`, `macos`, `windows`, ...).
pub fn current_os() -> &'static str {
    std::env::consts::OS
}

/// Identifiers that name the same OS in manifests.
///
/// Manifests written for other toolchains commonly say `darwin` where Rust
/// says `macos`.
fn os_aliases(os: &str) -> &[&str] {
    match os {
        "macos" | "darwin" => &["macos", "darwin"],
        _ => &[],
    }
}

/// Select the command a descriptor should run on `os`.
///
/// The per-OS map wins; otherwise the flat executable is used. Blank
/// commands count as absent. Returns `None` when the module cannot run on
/// this OS.
pub fn resolve_executable<'a>(os: &str, descriptor: &'a ModuleDescriptor) -> Option<&'a str> {
    let by_os = descriptor
        .executables_by_os
        .get(os)
        .or_else(|| {
            os_aliases(os)
                .iter()
                .find_map(|alias| descriptor.executables_by_os.get(*alias))
        })
        .map(String::as_str)
        .filter(|cmd| !cmd.trim().is_empty());

    by_os.or_else(|| {
        descriptor
            .executable
            .as_deref()
            .filter(|cmd| !cmd.trim().is_empty())
    })
}
