//! `secv check` - report missing module dependencies.

use anyhow::{Result, anyhow, bail};
use clap::Args;
use console::{Style, style};
use secv_registry::{ModuleHealth, check_dependencies};

use super::Context;

/// Arguments for `secv check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only check this module
    pub module: Option<String>,
}

/// Run the check command.
///
/// Fails when any checked module declares a dependency that is not on `PATH`.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry();
    let report = match &args.module {
        Some(name) => {
            let module = registry
                .get_by_name(name)
                .ok_or_else(|| anyhow!("module not found: {name}"))?;
            vec![check_dependencies(&module)]
        }
        None => registry.check_health(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, ctx.verbose);
    }

    let unhealthy = report.iter().filter(|h| !h.is_healthy()).count();
    if unhealthy > 0 {
        bail!("{unhealthy} module(s) have missing dependencies");
    }
    Ok(())
}

fn print_report(report: &[ModuleHealth], verbose: bool) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    println!("{}", style("Dependency Check").bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    if report.is_empty() {
        println!("{}", dim.apply_to("No modules found."));
        return;
    }

    for health in report {
        if health.is_healthy() {
            println!("  {:<24} {}", style(&health.module).cyan(), green.apply_to("ok"));
        } else {
            println!(
                "  {:<24} {} {}",
                style(&health.module).cyan(),
                yellow.apply_to("missing"),
                health.missing.join(", ")
            );
        }
        if verbose {
            for (name, path) in &health.found {
                println!("  {:<24} {} {}", "", name, dim.apply_to(path.display()));
            }
        }
    }
}
