//! # Options Command Implementation
//!
//! This module implements the `options` subcommand, which resolves a project
//! and lists every option of every reached project with its value and where
//! the value came from (`specify`, `assign`, `default` or `unset`).

use anyhow::{Context, Result};
use clap::Args;

use bundlekit::options::Results;

use super::ProjectArgs;

/// List resolved options
#[derive(Args, Debug)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the options as JSON instead of a listing.
    #[arg(long)]
    pub json: bool,
}

/// Execute the `options` command.
pub fn execute(args: OptionsArgs) -> Result<()> {
    let plan = args.project.build()?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&plan.options).context("Failed to render options")?;
        println!("{}", json);
    } else {
        print!("{}", render_listing(&plan.options));
    }
    Ok(())
}

/// One `key = value [source]` line per option, sorted by key.
pub fn render_listing(results: &Results) -> String {
    let width = results.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in results.iter() {
        let shown = value.raw.as_deref().unwrap_or("<unset>");
        out.push_str(&format!(
            "{:width$} = {} [{}]\n",
            key,
            shown,
            value.source.as_str(),
            width = width
        ));
    }
    out
}
