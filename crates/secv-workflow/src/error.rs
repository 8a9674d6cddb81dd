//! Error types for the workflow engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur while loading, starting or observing workflows.
///
/// Step failures are not errors: they are recorded as failed results on the
/// execution and handled by each step's error policy.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The definition failed validation.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A workflow file could not be decoded.
    #[error("failed to parse workflow '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A workflow file could not be read.
    #[error("failed to read workflow '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A step input referenced data that does not exist.
    #[error("{0}")]
    InputResolution(String),

    /// The execution did not finish within the wait limit.
    #[error("workflow execution {id} still running after {timeout:?}")]
    WaitTimeout { id: String, timeout: Duration },

    /// The execution has not reached a terminal status yet.
    #[error("workflow execution {0} is still running")]
    StillRunning(String),

    /// No execution with this id is tracked.
    #[error("workflow execution not found: {0}")]
    NotFound(String),
}
