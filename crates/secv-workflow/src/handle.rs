//! Handles for observing and cancelling running workflows.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WorkflowError};
use crate::execution::{ExecutionStatus, WorkflowExecution};

/// Shared state of one execution.
///
/// The step loop is the only writer. Every mutation happens under `execution`
/// and status changes are published on `status` after the lock is released.
#[derive(Debug)]
pub(crate) struct ExecutionState {
    pub(crate) execution: Mutex<WorkflowExecution>,
    pub(crate) status: watch::Sender<ExecutionStatus>,
    pub(crate) cancel: CancellationToken,
}

impl ExecutionState {
    pub(crate) fn new(execution: WorkflowExecution) -> Self {
        let (status, _) = watch::channel(execution.status);
        Self {
            execution: Mutex::new(execution),
            status,
            cancel: CancellationToken::new(),
        }
    }

    /// Apply `f` to the execution under its lock.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut WorkflowExecution) -> R) -> R {
        f(&mut self.execution.lock())
    }

    /// Move to a terminal status and notify waiters.
    pub(crate) fn finish(&self, status: ExecutionStatus) -> bool {
        let changed = self.update(|exec| exec.finish(status));
        if changed {
            self.status.send_replace(status);
        }
        changed
    }
}

/// A cheap, cloneable reference to a workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    id: String,
    state: Arc<ExecutionState>,
}

impl WorkflowHandle {
    pub(crate) fn new(id: String, state: Arc<ExecutionState>) -> Self {
        Self { id, state }
    }

    /// The execution id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status, without blocking.
    pub fn status(&self) -> ExecutionStatus {
        *self.state.status.borrow()
    }

    /// Snapshot of the execution, without blocking.
    pub fn poll(&self) -> WorkflowExecution {
        self.state.execution.lock().clone()
    }

    /// Wait until the execution reaches a terminal status.
    pub async fn wait(&self) -> WorkflowExecution {
        let mut rx = self.state.status.subscribe();
        // The sender lives in `state`, which this handle keeps alive.
        let _ = rx.wait_for(|status| status.is_terminal()).await;
        self.poll()
    }

    /// Like [`wait`](Self::wait), but give up after `timeout`.
    ///
    /// The execution keeps running when this returns
    /// [`WorkflowError::WaitTimeout`].
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<WorkflowExecution> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| WorkflowError::WaitTimeout {
                id: self.id.clone(),
                timeout,
            })
    }

    /// Request cancellation.
    ///
    /// The module running at the time is killed and recorded as cancelled;
    /// steps after it stay pending. A no-op once the execution has finished.
    pub fn cancel(&self) {
        if self.status().is_terminal() {
            return;
        }
        tracing::info!(workflow_id = %self.id, "cancelling workflow execution");
        self.state.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.state.cancel.is_cancelled()
    }
}
