//! SecV - module orchestrator for security tooling
//!
//! Main entry point for the SecV CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, info, list, reload, run, search, workflow};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// SecV - module orchestrator for security tooling
#[derive(Parser)]
#[command(name = "secv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Module root to scan instead of the configured ones (repeatable)
    #[arg(long = "root", global = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available modules
    List(list::ListArgs),

    /// Search modules by name, description or category
    Search(search::SearchArgs),

    /// Show details and help for a module
    Info(info::InfoArgs),

    /// Run a single module against a target
    Run(run::RunArgs),

    /// Run a workflow file against a target
    Workflow(workflow::WorkflowArgs),

    /// Rescan module roots and report what was loaded
    Reload(reload::ReloadArgs),

    /// Check that module dependencies are installed
    Check(check::CheckArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = secv_config::load_config(None)?;
    let config = loaded.config.clone();
    let logging = config.logging();

    // Console (human-readable, stderr) + rotating JSON file
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };
    let console_filter = format!(
        "secv={level},secv_registry={level},secv_exec={level},secv_workflow={level},secv_config={level},warn"
    );

    let log_dir = logging
        .dir
        .clone()
        .or_else(secv_config::log_dir)
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = if logging.json_file {
        tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("secv")
            .filename_suffix("log")
            .build(&log_dir)
            .ok()
    } else {
        None
    };
    let (file_writer, _guard) = match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&console_filter)),
                ),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "secv=trace,secv_registry=trace,secv_exec=trace,secv_workflow=trace,secv_config=trace,info",
                ))
        }))
        .init();

    for warning in loaded.warnings() {
        tracing::warn!("{warning}");
    }
    tracing::debug!(files = ?loaded.applied().collect::<Vec<_>>(), "configuration loaded");

    let ctx = commands::Context::new(config, cli.roots, cli.json, cli.verbose);

    // Dispatch to command handlers
    match cli.command {
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Search(args) => search::run(args, &ctx).await,
        Commands::Info(args) => info::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Workflow(args) => workflow::run(args, &ctx).await,
        Commands::Reload(args) => reload::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
    }
}
