//! `secv run` - execute one module against a target.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::Args;
use console::{Style, style};
use secv_exec::{ExecOptions, ExecutionEngine};
use secv_types::{ExecutionContext, ModuleResult};
use tokio_util::sync::CancellationToken;

use super::{Context, parse_params};

/// Arguments for `secv run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Module name
    pub module: String,

    /// Target host, address or URL
    #[arg(long, short)]
    pub target: String,

    /// Module parameter as key=value (repeatable; JSON values are parsed)
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Override the module's timeout, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Run the module and print its result.
///
/// Exits with an error when the module reports failure, so scripts can rely
/// on the process status.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry();
    let resolved = registry.lookup(&args.module)?;
    let parameters = parse_params(&args.params)?;

    let context = ExecutionContext::new(&args.target).with_parameters(parameters);
    let mut options = ExecOptions::default();
    if let Some(secs) = args.timeout {
        if secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        options = options.with_timeout(Duration::from_secs(secs));
    }

    if ctx.verbose {
        eprintln!(
            "Running {} ({}) against {}",
            resolved.descriptor.name, resolved.command, args.target
        );
    }

    let engine = ExecutionEngine::new();
    let result = with_interrupt(options.cancel.clone(), async {
        engine
            .execute_with(&resolved.descriptor, &context, &options)
            .await
    })
    .await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.success {
        Ok(())
    } else {
        Err(anyhow!(
            "module {} failed: {}",
            result.module_name,
            result.first_error().unwrap_or("no error reported")
        ))
    }
}

/// Drive `fut` to completion, cancelling `token` on Ctrl-C.
async fn with_interrupt<F: std::future::Future>(token: CancellationToken, fut: F) -> F::Output {
    tokio::pin!(fut);
    tokio::select! {
        out = &mut fut => out,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, stopping module...");
            token.cancel();
            fut.await
        }
    }
}

fn print_result(result: &ModuleResult) {
    let dim = Style::new().dim();

    let status = if result.success {
        Style::new().green().apply_to("success")
    } else {
        Style::new().red().apply_to("failed")
    };
    println!(
        "{} {} {}",
        style(&result.module_name).bold(),
        status,
        dim.apply_to(format!("({}ms)", result.execution_time_ms))
    );
    println!("{}", dim.apply_to("─".repeat(40)));

    if !result.data.is_null() {
        match serde_json::to_string_pretty(&result.data) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{}", result.data),
        }
    }

    for error in &result.errors {
        println!("{} {}", Style::new().red().apply_to("error:"), error);
    }
}
