//! `secv list` - list available modules.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use secv_types::ModuleDescriptor;
use serde_json::json;

use super::Context;

/// Arguments for `secv list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show modules in this category
    #[arg(long, short)]
    pub category: Option<String>,
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry();
    let modules = match &args.category {
        Some(category) => registry.list_by_category(category),
        None => registry.list_all(),
    };

    if ctx.json_output {
        print_json(&modules)
    } else {
        print_table(&modules, ctx.verbose);
        Ok(())
    }
}

/// Print modules as a JSON array of summaries.
pub(crate) fn print_json(modules: &[Arc<ModuleDescriptor>]) -> Result<()> {
    let list: Vec<_> = modules
        .iter()
        .map(|m| {
            json!({
                "name": m.name,
                "version": m.version,
                "category": m.category,
                "description": m.description,
                "source": m.source,
                "path": m.module_dir.display().to_string(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

/// Print modules grouped by category.
pub(crate) fn print_table(modules: &[Arc<ModuleDescriptor>], verbose: bool) {
    let dim = Style::new().dim();

    if modules.is_empty() {
        println!("{}", dim.apply_to("No modules found."));
        return;
    }

    let mut sorted: Vec<_> = modules.iter().collect();
    sorted.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));

    let mut current: Option<&str> = None;
    for module in sorted {
        if current != Some(module.category.as_str()) {
            if current.is_some() {
                println!();
            }
            let heading = if module.category.is_empty() {
                "uncategorized"
            } else {
                module.category.as_str()
            };
            println!("{}", style(heading).bold());
            println!("{}", dim.apply_to("─".repeat(40)));
            current = Some(module.category.as_str());
        }

        let source = if module.is_local() {
            String::new()
        } else {
            format!(" [{}]", module.source)
        };
        println!(
            "  {:<24} {}{}",
            style(&module.name).cyan(),
            module.description,
            dim.apply_to(source)
        );
        if verbose {
            println!("  {:<24} {}", "", dim.apply_to(module.module_dir.display()));
        }
    }

    println!();
    println!("{}", dim.apply_to(format!("{} module(s)", modules.len())));
}
