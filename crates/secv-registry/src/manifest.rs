//! `module.json` parsing and validation.
//!
//! ```json
//! {
//!   "name": "portscan",
//!   "version": "1.2.0",
//!   "category": "scanning",
//!   "description": "TCP connect scanner",
//!   "author": "secv",
//!   "executable": "python3 portscan.py",
//!   "executablesByOS": { "windows": "py portscan.py" },
//!   "dependencies": ["python3"],
//!   "timeout": 120,
//!   "concurrent": true
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use secv_types::{DEFAULT_TIMEOUT_SECS, ModuleDescriptor, ModuleHelp};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// File name the registry looks for under each root.
pub const MANIFEST_FILE: &str = "module.json";

/// Reasons a parsed manifest is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// A required field is missing or blank.
    #[error("missing required field '{field}': {hint}")]
    MissingField {
        field: &'static str,
        hint: &'static str,
    },

    /// A field has an unusable value.
    #[error("invalid value for '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl ManifestError {
    /// Create a missing field error.
    pub fn missing_field(field: &'static str, hint: &'static str) -> Self {
        Self::MissingField { field, hint }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// On-disk manifest, as written by module authors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default, rename = "executablesByOS")]
    pub executables_by_os: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub outputs: serde_json::Value,
    /// Seconds; absent or zero means [`DEFAULT_TIMEOUT_SECS`].
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub help: Option<ModuleHelp>,
}

impl ModuleManifest {
    /// Parse and validate a manifest from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, ManifestParseError> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| ManifestParseError::Json(e.to_string()))?;
        manifest.validate().map_err(ManifestParseError::Invalid)?;
        Ok(manifest)
    }

    /// Load, parse and validate a manifest file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::ReadManifest {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ManifestParseError::Json(reason) => RegistryError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            ManifestParseError::Invalid(source) => RegistryError::Validation {
                path: path.to_path_buf(),
                source,
            },
        })
    }

    /// Check the fields the registry cannot do without.
    ///
    /// A manifest needs a name and at least one way to start the module.
    pub fn validate(&self) -> std::result::Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::missing_field(
                "name",
                "add a unique module name (e.g. \"portscan\")",
            ));
        }

        if self.name.chars().any(char::is_whitespace) {
            return Err(ManifestError::invalid_field(
                "name",
                format!("'{}' must not contain whitespace", self.name),
            ));
        }

        let has_flat = self
            .executable
            .as_deref()
            .is_some_and(|cmd| !cmd.trim().is_empty());
        if !has_flat && self.executables_by_os.is_empty() {
            return Err(ManifestError::missing_field(
                "executable",
                "set 'executable' or 'executablesByOS'",
            ));
        }

        Ok(())
    }

    /// The effective timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        match self.timeout {
            Some(0) | None => DEFAULT_TIMEOUT_SECS,
            Some(secs) => secs,
        }
    }

    /// Turn a validated manifest into a descriptor rooted at `module_dir`.
    pub fn into_descriptor(self, module_dir: &Path, source: &str) -> ModuleDescriptor {
        let timeout_secs = self.timeout_secs();
        ModuleDescriptor {
            name: self.name,
            version: self.version,
            category: self.category,
            description: self.description,
            author: self.author,
            executable: self.executable.filter(|cmd| !cmd.trim().is_empty()),
            executables_by_os: self.executables_by_os,
            dependencies: self.dependencies,
            timeout_secs,
            concurrent: self.concurrent,
            module_dir: module_dir.to_path_buf(),
            source: source.to_string(),
            inputs: self.inputs,
            outputs: self.outputs,
            help: self.help,
        }
    }
}

/// Failure from [`ModuleManifest::from_json`], before a path is attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestParseError {
    #[error("{0}")]
    Json(String),
    #[error(transparent)]
    Invalid(ManifestError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_manifest() {
        let m = ModuleManifest::from_json(
            r#"{
                "name": "portscan",
                "version": "1.2.0",
                "category": "scanning",
                "description": "TCP connect scanner",
                "author": "secv",
                "executable": "python3 portscan.py",
                "executablesByOS": {"windows": "py portscan.py"},
                "dependencies": ["python3"],
                "inputs": {"ports": {"type": "string"}},
                "timeout": 120,
                "concurrent": true
            }"#,
        )
        .unwrap();

        assert_eq!(m.name, "portscan");
        assert_eq!(m.timeout_secs(), 120);
        assert!(m.concurrent);
        assert_eq!(m.executables_by_os["windows"], "py portscan.py");
        assert_eq!(m.dependencies, vec!["python3"]);
    }

    #[test]
    fn test_timeout_defaults() {
        let m = ModuleManifest::from_json(r#"{"name": "a", "executable": "./a"}"#).unwrap();
        assert_eq!(m.timeout_secs(), DEFAULT_TIMEOUT_SECS);

        let m = ModuleManifest::from_json(r#"{"name": "a", "executable": "./a", "timeout": 0}"#)
            .unwrap();
        assert_eq!(m.timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = ModuleManifest::from_json(r#"{"executable": "./a"}"#).unwrap_err();
        match err {
            ManifestParseError::Invalid(ManifestError::MissingField { field, .. }) => {
                assert_eq!(field, "name")
            }
            other => panic!("expected MissingField(name), got {other:?}"),
        }
    }

    #[test]
    fn test_missing_executables_rejected() {
        let err = ModuleManifest::from_json(r#"{"name": "a"}"#).unwrap_err();
        match err {
            ManifestParseError::Invalid(ManifestError::MissingField { field, .. }) => {
                assert_eq!(field, "executable")
            }
            other => panic!("expected MissingField(executable), got {other:?}"),
        }

        // A blank flat executable does not count either.
        assert!(ModuleManifest::from_json(r#"{"name": "a", "executable": "  "}"#).is_err());
    }

    #[test]
    fn test_os_map_alone_is_enough() {
        let m = ModuleManifest::from_json(
            r#"{"name": "a", "executablesByOS": {"linux": "./a-linux"}}"#,
        )
        .unwrap();
        assert!(m.executable.is_none());
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let err =
            ModuleManifest::from_json(r#"{"name": "port scan", "executable": "./a"}"#).unwrap_err();
        assert!(matches!(
            err,
            ManifestParseError::Invalid(ManifestError::InvalidField { field: "name", .. })
        ));
    }

    #[test]
    fn test_bad_json() {
        let err = ModuleManifest::from_json("{not json").unwrap_err();
        assert!(matches!(err, ManifestParseError::Json(_)));

        let err = ModuleManifest::from_json(r#"{"name": 5, "executable": "./a"}"#).unwrap_err();
        assert!(matches!(err, ManifestParseError::Json(_)));
    }

    #[test]
    fn test_into_descriptor() {
        let m = ModuleManifest::from_json(
            r#"{"name": "a", "executable": "./a", "category": "recon"}"#,
        )
        .unwrap();
        let d = m.into_descriptor(Path::new("/opt/tools/a"), "acme");
        assert_eq!(d.name, "a");
        assert_eq!(d.source, "acme");
        assert_eq!(d.module_dir, Path::new("/opt/tools/a"));
        assert_eq!(d.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(d.category, "recon");
    }

    #[test]
    fn test_from_file_attaches_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        std::fs::write(&path, r#"{"version": "1.0"}"#).unwrap();

        let err = ModuleManifest::from_file(&path).unwrap_err();
        match err {
            RegistryError::Validation { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Validation, got {other:?}"),
        }

        let err = ModuleManifest::from_file(&tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, RegistryError::ReadManifest { .. }));
    }
}
