//! # Resolve Command Implementation
//!
//! This module implements the `resolve` subcommand, which runs a full build
//! and prints the merged config tree.
//!
//! This command is a safe, read-only operation; the only files it writes are
//! git checkouts in the cache.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use super::ProjectArgs;

/// Output format for the merged config.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Print the merged config of a project
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format.
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs) -> Result<()> {
    let plan = args.project.build()?;
    let rendered = match args.format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(&plan.config).context("Failed to render config as YAML")?
        }
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&plan.config)
                .context("Failed to render config as JSON")?;
            json.push('\n');
            json
        }
    };
    print!("{}", rendered);
    Ok(())
}
