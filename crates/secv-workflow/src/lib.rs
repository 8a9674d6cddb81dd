//! Workflow engine for SecV.
//!
//! A workflow is an ordered list of steps, each running one registry module
//! against a shared target. Steps run strictly in order on a dedicated tokio
//! task:
//!
//! 1. A step whose `<step>.success` condition is false is skipped.
//! 2. The module is looked up; a missing module is a failed step.
//! 3. `${...}` references in the step inputs are resolved, then merged over
//!    the global parameters.
//! 4. The module runs with every earlier result in its context.
//! 5. A failed step under `on_error: stop` fails the workflow.
//!
//! [`WorkflowEngine::execute_workflow`] returns a [`WorkflowHandle`] at once;
//! the handle can poll, wait (optionally with a timeout) and cancel.

pub mod condition;
pub mod definition;
pub mod engine;
pub mod error;
pub mod execution;
pub mod handle;
pub mod inputs;

pub use condition::Condition;
pub use definition::{ErrorPolicy, WorkflowDefinition, WorkflowStep};
pub use engine::WorkflowEngine;
pub use error::{Result, WorkflowError};
pub use execution::{ExecutionStatus, StepState, StepStatus, WorkflowExecution};
pub use handle::WorkflowHandle;
pub use inputs::InputResolver;
