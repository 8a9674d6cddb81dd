//! `secv reload` - rescan module roots and report the result.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use secv_registry::{LoadReport, ModuleRegistry};
use serde_json::json;

use super::Context;

/// Arguments for `secv reload`.
#[derive(Args, Debug)]
pub struct ReloadArgs {}

/// Run the reload command.
pub async fn run(_args: ReloadArgs, ctx: &Context) -> Result<()> {
    // One scan; its load report is what gets printed.
    let registry = ModuleRegistry::load(ctx.module_roots());
    let report = registry.snapshot().report().clone();

    if ctx.json_output {
        print_json(&report, ctx)?;
    } else {
        print_report(&report, ctx);
    }
    Ok(())
}

fn print_json(report: &LoadReport, ctx: &Context) -> Result<()> {
    let roots: Vec<_> = ctx
        .module_roots()
        .iter()
        .map(|r| json!({ "path": r.path.display().to_string(), "source": r.source }))
        .collect();
    let renamed: Vec<_> = report
        .renamed
        .iter()
        .map(|(original, renamed)| json!({ "original": original, "renamed": renamed }))
        .collect();
    let rejected: Vec<_> = report
        .rejected
        .iter()
        .map(|r| json!({ "path": r.path.display().to_string(), "reason": r.reason }))
        .collect();

    let out = json!({
        "roots": roots,
        "roots_scanned": report.roots_scanned,
        "loaded": report.loaded,
        "renamed": renamed,
        "duplicates": report
            .duplicates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        "rejected": rejected,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_report(report: &LoadReport, ctx: &Context) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    println!("{}", style("Module Registry").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for root in ctx.module_roots() {
        let marker = if root.path.is_dir() {
            green.apply_to("●")
        } else {
            dim.apply_to("○")
        };
        println!(
            "  {} {} {}",
            marker,
            root.path.display(),
            dim.apply_to(format!("({})", root.source))
        );
    }
    println!();
    println!(
        "  {} module(s) loaded from {} root(s)",
        green.apply_to(report.loaded),
        report.roots_scanned
    );

    for (original, renamed) in &report.renamed {
        println!("  {} {original} → {renamed}", yellow.apply_to("renamed"));
    }
    for path in &report.duplicates {
        println!("  {} {}", yellow.apply_to("duplicate"), path.display());
    }
    for rejected in &report.rejected {
        println!(
            "  {} {}: {}",
            Style::new().red().apply_to("rejected"),
            rejected.path.display(),
            rejected.reason
        );
    }
}
