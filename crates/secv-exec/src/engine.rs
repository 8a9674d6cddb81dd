//! Module invocation with the SecV stdin/stdout protocol.

use std::time::{Duration, Instant};

use secv_types::{ExecutionContext, ModuleDescriptor, ModuleResult, Timestamp, current_os};
use tokio_util::sync::CancellationToken;

use crate::error::{ExecError, Result};
use crate::process::{ProcessOutcome, ProcessOutput, ProcessSpec, run_process};
use crate::protocol::parse_output;

/// Error text recorded when an invocation is cancelled.
pub const CANCELLED_ERROR: &str = "execution cancelled";

/// Per-call knobs for [`ExecutionEngine::execute_with`].
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Overrides the descriptor's declared timeout.
    pub timeout: Option<Duration>,
    /// Fires to abort the invocation and kill its process group.
    pub cancel: CancellationToken,
}

impl ExecOptions {
    /// Set a timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs modules as subprocesses.
///
/// The engine is stateless apart from the OS identifier used to pick a
/// command, so one instance can serve any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    os: String,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    /// Engine for the running OS.
    pub fn new() -> Self {
        Self::for_os(current_os())
    }

    /// Engine that selects commands as if running on `os`.
    pub fn for_os(os: impl Into<String>) -> Self {
        Self { os: os.into() }
    }

    /// The OS identifier used for command selection.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Run a module with its declared timeout.
    pub async fn execute(
        &self,
        descriptor: &ModuleDescriptor,
        context: &ExecutionContext,
    ) -> ModuleResult {
        self.execute_with(descriptor, context, &ExecOptions::default())
            .await
    }

    /// Run a module.
    ///
    /// Never fails: every outcome, including timeouts, crashes and protocol
    /// violations, is reported as a [`ModuleResult`] with `success = false`.
    pub async fn execute_with(
        &self,
        descriptor: &ModuleDescriptor,
        context: &ExecutionContext,
        options: &ExecOptions,
    ) -> ModuleResult {
        let started = secv_types::now();
        let clock = Instant::now();
        let timeout = options
            .timeout
            .unwrap_or_else(|| Duration::from_secs(descriptor.timeout_secs));

        tracing::info!(
            module = %descriptor.name,
            target = %context.target,
            timeout_secs = timeout.as_secs(),
            "executing module"
        );

        let outcome = match self
            .spawn_and_wait(descriptor, context, timeout, &options.cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(module = %descriptor.name, error = %e, "module could not be run");
                return ModuleResult::failure(
                    &descriptor.name,
                    started,
                    clock.elapsed(),
                    e.to_string(),
                );
            }
        };

        let result = classify(descriptor, outcome, timeout, started, clock.elapsed());
        if result.success {
            tracing::info!(
                module = %descriptor.name,
                duration_ms = result.execution_time_ms,
                "module succeeded"
            );
        } else {
            tracing::warn!(
                module = %descriptor.name,
                duration_ms = result.execution_time_ms,
                error = result.first_error().unwrap_or_default(),
                "module failed"
            );
        }
        result
    }

    async fn spawn_and_wait(
        &self,
        descriptor: &ModuleDescriptor,
        context: &ExecutionContext,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome> {
        let command = descriptor
            .command_for(&self.os)
            .ok_or_else(|| ExecError::NoExecutable {
                module: descriptor.name.clone(),
                os: self.os.clone(),
            })?;

        let spec = ProcessSpec::from_command_line(command, &descriptor.module_dir, timeout)
            .ok_or_else(|| ExecError::EmptyCommand(descriptor.name.clone()))?
            .with_stdin(serde_json::to_vec(context)?);

        tracing::debug!(
            module = %descriptor.name,
            program = %spec.program.display(),
            cwd = %spec.cwd.display(),
            "spawning module process"
        );

        run_process(spec, cancel).await
    }
}

fn classify(
    descriptor: &ModuleDescriptor,
    outcome: ProcessOutcome,
    timeout: Duration,
    started: Timestamp,
    elapsed: Duration,
) -> ModuleResult {
    let name = descriptor.name.as_str();
    match outcome {
        ProcessOutcome::TimedOut => ModuleResult::failure(
            name,
            started,
            elapsed,
            format!("execution timed out after {}", format_timeout(timeout)),
        ),
        ProcessOutcome::Cancelled => ModuleResult::failure(name, started, elapsed, CANCELLED_ERROR),
        ProcessOutcome::Exited(output) => from_output(name, output, started, elapsed),
    }
}

fn from_output(
    name: &str,
    output: ProcessOutput,
    started: Timestamp,
    elapsed: Duration,
) -> ModuleResult {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        tracing::debug!(module = %name, stderr = %stderr, "module stderr");
    }

    if !output.status.success() {
        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => output.status.to_string(),
        };
        let message = if stderr.is_empty() {
            format!("module exited with {status}")
        } else {
            format!("module exited with {status}: {stderr}")
        };
        return ModuleResult::failure(name, started, elapsed, message);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_output(&stdout) {
        Ok(parsed) => ModuleResult {
            success: parsed.success,
            data: parsed.data,
            errors: parsed.errors,
            execution_time_ms: 0,
            module_name: String::new(),
            timestamp: started,
        }
        .stamped(name, started, elapsed),
        Err(message) => ModuleResult::failure(name, started, elapsed, message),
    }
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
