//! `secv search` - find modules by keyword.

use anyhow::Result;
use clap::Args;

use super::Context;
use super::list::{print_json, print_table};

/// Arguments for `secv search`.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Case-insensitive text matched against name, description and category
    pub query: String,
}

/// Run the search command.
pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry();
    let matches = registry.search(&args.query);

    if ctx.json_output {
        print_json(&matches)
    } else {
        print_table(&matches, ctx.verbose);
        Ok(())
    }
}
