//! The workflow step loop.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use secv_exec::{CANCELLED_ERROR, ExecOptions, ExecutionEngine};
use secv_registry::ModuleRegistry;
use secv_types::{ExecutionContext, ModuleResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::definition::{ErrorPolicy, WorkflowDefinition, WorkflowStep};
use crate::error::{Result, WorkflowError};
use crate::execution::{ExecutionStatus, StepStatus, WorkflowExecution};
use crate::handle::{ExecutionState, WorkflowHandle};
use crate::inputs::InputResolver;

/// Runs workflow definitions against the module registry.
///
/// Each execution gets its own tokio task; the engine only keeps handles so
/// executions can be looked up and cancelled by id. Finished executions stay
/// tracked, results included, until [`forget`](Self::forget) or
/// [`prune_finished`](Self::prune_finished) drops them.
pub struct WorkflowEngine {
    registry: Arc<ModuleRegistry>,
    executor: ExecutionEngine,
    executions: RwLock<HashMap<String, WorkflowHandle>>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ModuleRegistry>, executor: ExecutionEngine) -> Self {
        Self {
            registry,
            executor,
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// The registry modules are resolved against.
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Load and validate a workflow file.
    pub fn load_workflow(&self, path: &Path) -> Result<WorkflowDefinition> {
        WorkflowDefinition::from_file(path)
    }

    /// Validate `definition` and start running it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute_workflow(
        &self,
        definition: WorkflowDefinition,
        target: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Result<WorkflowHandle> {
        definition.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let target = target.into();
        info!(
            workflow_id = %id,
            workflow = %definition.name,
            target = %target,
            steps = definition.steps.len(),
            "starting workflow"
        );

        let execution = WorkflowExecution::new(id.clone(), definition, target, parameters);
        let state = Arc::new(ExecutionState::new(execution));
        let handle = WorkflowHandle::new(id.clone(), Arc::clone(&state));

        self.executions.write().insert(id, handle.clone());

        let runner = StepRunner {
            state,
            registry: Arc::clone(&self.registry),
            executor: self.executor.clone(),
        };
        tokio::spawn(runner.run());

        Ok(handle)
    }

    /// Start a workflow and wait for it to finish.
    pub async fn run_workflow(
        &self,
        definition: WorkflowDefinition,
        target: impl Into<String>,
        parameters: HashMap<String, Value>,
    ) -> Result<WorkflowExecution> {
        let handle = self.execute_workflow(definition, target, parameters)?;
        Ok(handle.wait().await)
    }

    /// Handle for a tracked execution.
    pub fn handle(&self, id: &str) -> Option<WorkflowHandle> {
        self.executions.read().get(id).cloned()
    }

    /// Snapshot of a tracked execution.
    pub fn get_execution(&self, id: &str) -> Option<WorkflowExecution> {
        self.handle(id).map(|h| h.poll())
    }

    /// Snapshots of every tracked execution, oldest first.
    pub fn list_executions(&self) -> Vec<WorkflowExecution> {
        let mut all: Vec<_> = self.executions.read().values().map(|h| h.poll()).collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Cancel a tracked execution.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let handle = self
            .handle(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        handle.cancel();
        Ok(())
    }

    /// Stop tracking a finished execution and return its final state.
    ///
    /// Handles already given out keep working.
    pub fn forget(&self, id: &str) -> Result<WorkflowExecution> {
        let mut executions = self.executions.write();
        let handle = executions
            .get(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        if !handle.status().is_terminal() {
            return Err(WorkflowError::StillRunning(id.to_string()));
        }
        let execution = handle.poll();
        executions.remove(id);
        Ok(execution)
    }

    /// Stop tracking every finished execution. Returns how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let mut executions = self.executions.write();
        let before = executions.len();
        executions.retain(|_, handle| !handle.status().is_terminal());
        let pruned = before - executions.len();
        if pruned > 0 {
            debug!(pruned, remaining = executions.len(), "pruned finished workflow executions");
        }
        pruned
    }
}

enum StepOutcome {
    Continue,
    Halt(ExecutionStatus),
}

struct StepRunner {
    state: Arc<ExecutionState>,
    registry: Arc<ModuleRegistry>,
    executor: ExecutionEngine,
}

impl StepRunner {
    async fn run(self) {
        let (id, definition, target, globals) = self.state.update(|exec| {
            let mut globals = exec.definition.parameters.clone();
            globals.extend(exec.parameters.clone());
            (
                exec.id.clone(),
                exec.definition.clone(),
                exec.target.clone(),
                globals,
            )
        });

        let mut final_status = ExecutionStatus::Completed;
        for (index, step) in definition.steps.iter().enumerate() {
            if self.state.cancel.is_cancelled() {
                final_status = ExecutionStatus::Cancelled;
                break;
            }

            let outcome = self.run_step(&id, index, step, &target, &globals).await;
            if let StepOutcome::Halt(status) = outcome {
                final_status = status;
                break;
            }
        }

        self.state.finish(final_status);

        let execution = self.state.execution.lock().clone();
        info!(
            workflow_id = %id,
            workflow = %definition.name,
            status = %execution.status,
            succeeded = execution.succeeded_count(),
            recorded = execution.results.len(),
            duration_ms = execution.duration().num_milliseconds(),
            "workflow finished"
        );
    }

    async fn run_step(
        &self,
        id: &str,
        index: usize,
        step: &WorkflowStep,
        target: &str,
        globals: &HashMap<String, Value>,
    ) -> StepOutcome {
        let results = self.state.update(|exec| exec.results.clone());

        if let Some(Ok(condition)) = step.parsed_condition()
            && !condition.evaluate(&results)
        {
            debug!(
                workflow_id = %id,
                step = %step.name,
                condition = %condition,
                "condition not met, skipping step"
            );
            self.state
                .update(|exec| exec.set_step_status(&step.name, StepStatus::Skipped));
            return StepOutcome::Continue;
        }

        self.state
            .update(|exec| exec.set_step_status(&step.name, StepStatus::Running));
        info!(
            workflow_id = %id,
            step = %step.name,
            module = %step.module,
            index = index + 1,
            "running step"
        );

        let result = self.invoke(id, step, target, globals, results).await;
        let cancelled = self.state.cancel.is_cancelled()
            && !result.success
            && result.first_error() == Some(CANCELLED_ERROR);

        let step_status = if cancelled {
            StepStatus::Cancelled
        } else if result.success {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        };

        if !result.success && !cancelled {
            warn!(
                workflow_id = %id,
                step = %step.name,
                module = %step.module,
                error = result.first_error().unwrap_or_default(),
                on_error = ?step.on_error,
                "step failed"
            );
        }

        self.state.update(|exec| {
            exec.results.insert(step.name.clone(), result);
            exec.set_step_status(&step.name, step_status);
        });

        match step_status {
            StepStatus::Cancelled => StepOutcome::Halt(ExecutionStatus::Cancelled),
            StepStatus::Failed if step.on_error == ErrorPolicy::Stop => {
                StepOutcome::Halt(ExecutionStatus::Failed)
            }
            _ => StepOutcome::Continue,
        }
    }

    async fn invoke(
        &self,
        id: &str,
        step: &WorkflowStep,
        target: &str,
        globals: &HashMap<String, Value>,
        results: HashMap<String, ModuleResult>,
    ) -> ModuleResult {
        let Some(descriptor) = self.registry.get_by_name(&step.module) else {
            let error = format!("module not found: {}", step.module);
            return ModuleResult::not_run(&step.module, error);
        };

        let inputs = match InputResolver::new(target, &results).resolve_inputs(&step.inputs) {
            Ok(inputs) => inputs,
            Err(e) => return ModuleResult::not_run(&descriptor.name, e.to_string()),
        };

        let mut parameters = globals.clone();
        parameters.extend(inputs);

        let context = ExecutionContext::new(target)
            .with_parameters(parameters)
            .with_results(results)
            .for_step(id, &step.name);

        let mut options = ExecOptions::default().with_cancel(self.state.cancel.child_token());
        if let Some(secs) = step.timeout.filter(|secs| *secs > 0) {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        self.executor.execute_with(&descriptor, &context, &options).await
    }
}
