//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks that a
//! project's manifest parses and that the whole project resolves: every
//! import is reachable, every required option is set, no assigns conflict,
//! every verification passes and the config sources merge cleanly.
//!
//! This command is a safe, read-only operation.

use anyhow::{Context, Result};
use clap::Args;

use bundlekit::manifest;

use super::ProjectArgs;

/// Validate a project and everything it imports
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only parse and validate the root manifest, without resolving imports.
    #[arg(long)]
    pub manifest_only: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs) -> Result<()> {
    let dir = &args.project.project;
    println!("Validating project: {}", dir.display());

    let root = manifest::from_dir(dir)
        .with_context(|| format!("Invalid manifest in {}", dir.display()))?;
    println!("Manifest OK: {} ({} options)", root.name, root.option.items.len());
    if args.manifest_only {
        return Ok(());
    }

    let plan = args.project.build()?;
    println!(
        "Resolution OK: {} script imports, {} config imports, {} options",
        plan.script_closure.len(),
        plan.config_closure.len(),
        plan.options.len()
    );
    println!(
        "Sources OK: {} scripts, {} config sources",
        plan.scripts.len(),
        plan.config_sources.len()
    );
    Ok(())
}
