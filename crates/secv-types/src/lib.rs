//! Shared data model for the SecV module orchestrator.
//!
//! These types are exchanged between the registry, the execution engine and
//! the workflow engine, and most of them also cross the process boundary as
//! JSON: [`ExecutionContext`] is what a module reads on stdin and
//! [`ModuleResult`] is what callers get back.

pub mod context;
pub mod descriptor;
pub mod result;

pub use context::ExecutionContext;
pub use descriptor::{
    DEFAULT_TIMEOUT_SECS, ExampleHelp, LOCAL_SOURCE, ModuleDescriptor, ModuleHelp, ParameterHelp,
    current_os, resolve_executable,
};
pub use result::ModuleResult;

/// Timestamp type used throughout SecV.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
