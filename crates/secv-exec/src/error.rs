//! Execution error types.
//!
//! These never reach callers of [`ExecutionEngine::execute`](crate::ExecutionEngine::execute):
//! the engine folds them into failed [`ModuleResult`](secv_types::ModuleResult)s.
//! They are public for users of the lower-level [`run_process`](crate::run_process).

/// Result type alias for execution operations.
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors raised before or while talking to a module process.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The module declares no command for this OS.
    #[error("no suitable executable found for module '{module}' on OS '{os}'")]
    NoExecutable { module: String, os: String },

    /// The resolved command is blank.
    #[error("empty executable command for module '{0}'")]
    EmptyCommand(String),

    /// The execution context could not be encoded.
    #[error("failed to serialize execution context: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Reading from or waiting on the process failed.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}
