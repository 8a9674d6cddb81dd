//! Registry error types.

use std::path::PathBuf;

use crate::manifest::ManifestError;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors raised while loading or querying the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A manifest could not be read from disk.
    #[error("failed to read manifest '{path}': {source}")]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A manifest is not valid JSON or has fields of the wrong type.
    #[error("failed to parse manifest '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A manifest parsed but failed validation.
    #[error("invalid manifest '{path}': {source}")]
    Validation {
        path: PathBuf,
        source: ManifestError,
    },

    /// No module with this name is registered.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The module exists but declares no command for this OS.
    #[error("no suitable executable found for module '{module}' on OS '{os}'")]
    NoExecutable { module: String, os: String },
}

impl RegistryError {
    /// Whether this error means a lookup could not be satisfied.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            RegistryError::ModuleNotFound(_) | RegistryError::NoExecutable { .. }
        )
    }

    /// Whether this error means a manifest was rejected during load.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RegistryError::ReadManifest { .. }
                | RegistryError::Parse { .. }
                | RegistryError::Validation { .. }
        )
    }
}
