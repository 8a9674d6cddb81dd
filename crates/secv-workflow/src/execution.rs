//! Workflow execution state.

use std::collections::HashMap;
use std::fmt;

use secv_types::{ModuleResult, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::WorkflowDefinition;

/// Lifecycle of a workflow execution.
///
/// `Running` is the only initial state. Every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Where a single step is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not reached yet, or never reached because the workflow stopped.
    Pending,
    Running,
    /// Condition evaluated false; no result is recorded.
    Skipped,
    Succeeded,
    Failed,
    /// Interrupted by cancellation.
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Skipped => "skipped",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Name and status of one step, in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub name: String,
    pub status: StepStatus,
}

/// One run of a workflow definition against a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    /// Snapshot of the definition taken when the execution started.
    pub definition: WorkflowDefinition,
    pub target: String,
    /// Global parameters supplied by the caller.
    pub parameters: HashMap<String, Value>,
    pub status: ExecutionStatus,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    /// Step name → result. Skipped and unreached steps have no entry.
    pub results: HashMap<String, ModuleResult>,
    pub steps: Vec<StepState>,
}

impl WorkflowExecution {
    /// A fresh `Running` execution with every step `Pending`.
    pub fn new(
        id: impl Into<String>,
        definition: WorkflowDefinition,
        target: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Self {
        let steps = definition
            .steps
            .iter()
            .map(|s| StepState {
                name: s.name.clone(),
                status: StepStatus::Pending,
            })
            .collect();

        Self {
            id: id.into(),
            definition,
            target: target.into(),
            parameters,
            status: ExecutionStatus::Running,
            started_at: secv_types::now(),
            finished_at: None,
            results: HashMap::new(),
            steps,
        }
    }

    /// Status of the named step.
    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.name == name).map(|s| s.status)
    }

    pub(crate) fn set_step_status(&mut self, name: &str, status: StepStatus) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.name == name) {
            step.status = status;
        }
    }

    /// Move to a terminal status.
    ///
    /// Returns `false` and changes nothing if the execution already finished.
    pub(crate) fn finish(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at = Some(secv_types::now());
        true
    }

    /// Wall-clock duration so far, or in total once finished.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(secv_types::now) - self.started_at
    }

    /// Number of recorded results with `success = true`.
    pub fn succeeded_count(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }
}
