//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `bundlekit` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`. Every command flattens [`ProjectArgs`] so project
//!   selection works the same everywhere.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic, calling into the `bundlekit` library.

pub mod options;
pub mod resolve;
pub mod tree;
pub mod validate;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use bundlekit::phases::orchestrator::{self, BuildOptions};
use bundlekit::phases::BuildPlan;

/// Arguments selecting the project to resolve.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Directory of the root project.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Workspace profile to activate.
    ///
    /// Can also be set with the `BUNDLEKIT_PROFILE` environment variable.
    #[arg(long, value_name = "NAME", env = "BUNDLEKIT_PROFILE")]
    pub profile: Option<String>,

    /// Set a root option, as `name=value`. May be repeated.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// The root directory for git checkouts.
    ///
    /// If not provided, it defaults to the workspace `cacheRoot` or the
    /// system's cache directory (e.g., `~/.cache/bundlekit` on Linux).
    /// Can also be set with the `BUNDLEKIT_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "BUNDLEKIT_CACHE")]
    pub cache_root: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            profile: self.profile.clone(),
            specify: self.set.iter().cloned().collect(),
            cache_root: self.cache_root.clone(),
        }
    }

    /// Run a full build of the selected project.
    pub fn build(&self) -> Result<BuildPlan> {
        orchestrator::build(&self.project, &self.build_options())
            .with_context(|| format!("Failed to resolve project {}", self.project.display()))
    }
}

/// Parse a `name=value` pair.
fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty option name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_assignment("app.url=a=b").unwrap(),
            ("app.url".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_assignment("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_build_options_collects_specify() {
        let args = ProjectArgs {
            project: PathBuf::from("."),
            profile: Some("dev".to_string()),
            set: vec![
                ("env".to_string(), "prod".to_string()),
                ("env".to_string(), "staging".to_string()),
            ],
            cache_root: None,
        };
        let options = args.build_options();
        assert_eq!(options.profile.as_deref(), Some("dev"));
        assert_eq!(options.specify.get("env").map(String::as_str), Some("staging"));
    }
}
