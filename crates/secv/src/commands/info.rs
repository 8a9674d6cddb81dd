//! `secv info` - show a module's details and help.

use anyhow::{Result, anyhow};
use clap::Args;
use console::{Style, style};
use secv_types::{ModuleDescriptor, current_os, resolve_executable};

use super::Context;

/// Arguments for `secv info`.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Module name
    pub module: String,
}

/// Run the info command.
pub async fn run(args: InfoArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry();
    let module = registry
        .get_by_name(&args.module)
        .ok_or_else(|| anyhow!("module not found: {}", args.module))?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(module.as_ref())?);
    } else {
        print_details(&module);
    }
    Ok(())
}

fn print_details(module: &ModuleDescriptor) {
    let dim = Style::new().dim();
    let yellow = Style::new().yellow();

    println!("{} {}", style(&module.name).bold(), dim.apply_to(&module.version));
    println!("{}", dim.apply_to("─".repeat(40)));

    let description = module
        .help
        .as_ref()
        .map(|h| h.description.as_str())
        .filter(|d| !d.is_empty())
        .unwrap_or(module.description.as_str());
    if !description.is_empty() {
        println!("{description}");
        println!();
    }

    println!("  {:<12} {}", dim.apply_to("Category:"), module.category);
    println!("  {:<12} {}", dim.apply_to("Source:"), module.source);
    if !module.author.is_empty() {
        println!("  {:<12} {}", dim.apply_to("Author:"), module.author);
    }
    println!("  {:<12} {}s", dim.apply_to("Timeout:"), module.timeout_secs);
    println!("  {:<12} {}", dim.apply_to("Path:"), module.module_dir.display());
    match resolve_executable(current_os(), module) {
        Some(command) => println!("  {:<12} {}", dim.apply_to("Command:"), command),
        None => println!(
            "  {:<12} {}",
            dim.apply_to("Command:"),
            yellow.apply_to(format!("none for {}", current_os()))
        ),
    }
    if !module.dependencies.is_empty() {
        println!(
            "  {:<12} {}",
            dim.apply_to("Requires:"),
            module.dependencies.join(", ")
        );
    }

    let Some(help) = &module.help else {
        return;
    };

    if !help.parameters.is_empty() {
        println!();
        println!("{}", style("Parameters").bold());
        for (name, param) in &help.parameters {
            let mut flags = Vec::new();
            if !param.kind.is_empty() {
                flags.push(param.kind.clone());
            }
            if param.required {
                flags.push("required".to_string());
            }
            if let Some(default) = &param.default {
                flags.push(format!("default {default}"));
            }
            println!(
                "  {:<16} {} {}",
                style(name).cyan(),
                param.description,
                dim.apply_to(format!("({})", flags.join(", ")))
            );
            if !param.options.is_empty() {
                println!("  {:<16} {}", "", dim.apply_to(param.options.join(" | ")));
            }
        }
    }

    if !help.examples.is_empty() {
        println!();
        println!("{}", style("Examples").bold());
        for example in &help.examples {
            println!("  {}", example.description);
            for command in &example.commands {
                println!("    {}", dim.apply_to(command));
            }
        }
    }

    if !help.notes.is_empty() {
        println!();
        println!("{}", style("Notes").bold());
        for note in &help.notes {
            println!("  - {note}");
        }
    }
}
