//! `secv workflow` - run a workflow file against a target.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::Args;
use console::{Style, style};
use secv_exec::ExecutionEngine;
use secv_workflow::{ExecutionStatus, StepStatus, WorkflowEngine, WorkflowExecution};

use super::{Context, parse_params};

const WORKFLOW_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// Arguments for `secv workflow`.
#[derive(Args, Debug)]
pub struct WorkflowArgs {
    /// Workflow file, or the name of a workflow in the workflows directory
    pub workflow: String,

    /// Target host, address or URL
    #[arg(long, short)]
    pub target: String,

    /// Global parameter as key=value (repeatable; JSON values are parsed)
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Give up waiting after this many seconds and cancel the run
    #[arg(long, value_name = "SECS")]
    pub wait_timeout: Option<u64>,
}

/// Run the workflow command.
pub async fn run(args: WorkflowArgs, ctx: &Context) -> Result<()> {
    let settings = ctx.config.workflows();
    let path = resolve_workflow_path(&args.workflow, &settings.dir)?;
    let parameters = parse_params(&args.params)?;

    let engine = WorkflowEngine::new(ctx.load_registry(), ExecutionEngine::new());
    let definition = engine.load_workflow(&path)?;

    if !ctx.json_output {
        println!(
            "{} {} {}",
            style("Workflow").bold(),
            style(&definition.name).cyan(),
            Style::new()
                .dim()
                .apply_to(format!("({} steps, target {})", definition.steps.len(), args.target))
        );
    }

    let handle = engine.execute_workflow(definition, &args.target, parameters)?;
    let wait_timeout = args
        .wait_timeout
        .or(settings.wait_timeout_secs)
        .map(Duration::from_secs);

    let wait = async {
        match wait_timeout {
            Some(timeout) => handle.wait_timeout(timeout).await,
            None => Ok(handle.wait().await),
        }
    };

    let execution = tokio::select! {
        out = wait => match out {
            Ok(execution) => execution,
            Err(e) => {
                handle.cancel();
                let execution = handle.wait().await;
                report(&execution, ctx)?;
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, cancelling workflow...");
            handle.cancel();
            handle.wait().await
        }
    };

    report(&execution, ctx)?;

    match execution.status {
        ExecutionStatus::Completed => Ok(()),
        status => Err(anyhow!("workflow {} {}", execution.definition.name, status)),
    }
}

/// Find the workflow file: an existing path, or `<dir>/<name>.{yml,yaml,json}`.
fn resolve_workflow_path(workflow: &str, dir: &Path) -> Result<PathBuf> {
    let direct = PathBuf::from(workflow);
    if direct.is_file() {
        return Ok(direct);
    }

    for ext in WORKFLOW_EXTENSIONS {
        let candidate = dir.join(format!("{workflow}.{ext}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    bail!(
        "workflow not found: {workflow} (looked for a file and in {})",
        dir.display()
    )
}

fn report(execution: &WorkflowExecution, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(execution)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();

    println!("{}", dim.apply_to("─".repeat(40)));
    for step in &execution.steps {
        let status = match step.status {
            StepStatus::Succeeded => green.apply_to(step.status.to_string()),
            StepStatus::Failed | StepStatus::Cancelled => red.apply_to(step.status.to_string()),
            StepStatus::Skipped => yellow.apply_to(step.status.to_string()),
            StepStatus::Pending | StepStatus::Running => dim.apply_to(step.status.to_string()),
        };
        let detail = execution
            .results
            .get(&step.name)
            .map(|r| {
                let error = r.first_error().map(|e| format!(" {e}")).unwrap_or_default();
                format!("{}ms{}", r.execution_time_ms, error)
            })
            .unwrap_or_default();
        println!("  {:<20} {:<10} {}", step.name, status, dim.apply_to(detail));

        if ctx.verbose
            && let Some(result) = execution.results.get(&step.name)
            && !result.data.is_null()
        {
            println!("  {:<20} {}", "", dim.apply_to(&result.data));
        }
    }
    println!("{}", dim.apply_to("─".repeat(40)));

    let status = match execution.status {
        ExecutionStatus::Completed => green.apply_to(execution.status.to_string()),
        _ => red.apply_to(execution.status.to_string()),
    };
    println!(
        "{} {} {}",
        style("Result:").bold(),
        status,
        dim.apply_to(format!(
            "({}/{} steps succeeded in {}ms)",
            execution.succeeded_count(),
            execution.steps.len(),
            execution.duration().num_milliseconds()
        ))
    );
    Ok(())
}
