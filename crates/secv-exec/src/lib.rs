//! Execution engine for SecV modules.
//!
//! Each invocation is one OS process. The engine writes an
//! [`ExecutionContext`](secv_types::ExecutionContext) to the process's stdin
//! as JSON, expects a `{success, data, errors}` object on stdout, and turns
//! every outcome into a [`ModuleResult`](secv_types::ModuleResult).
//!
//! | Outcome | Result |
//! |---|---|
//! | exit 0, valid envelope | the module's own `success`/`data`/`errors` |
//! | exit 0, bad stdout | failure, parse error and raw output |
//! | non-zero exit | failure, exit status and stderr |
//! | deadline passed | failure, `execution timed out after Ns` |
//! | cancelled | failure, `execution cancelled` |
//!
//! Processes are started in their own process group; timeouts and
//! cancellation kill the whole group.

pub mod engine;
pub mod error;
pub mod process;
pub mod protocol;

pub use engine::{CANCELLED_ERROR, ExecOptions, ExecutionEngine};
pub use error::{ExecError, Result};
pub use process::{ProcessOutcome, ProcessOutput, ProcessSpec, run_process};
pub use protocol::{ModuleOutput, parse_output};
