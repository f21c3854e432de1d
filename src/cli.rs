//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Bundlekit - Resolve shell-script bundle projects
#[derive(Parser, Debug)]
#[command(name = "bundlekit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    ///
    /// `RUST_LOG`, when set, takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the merged config of a project
    Resolve(commands::resolve::ResolveArgs),

    /// List the resolved options of every reached project
    Options(commands::options::OptionsArgs),

    /// Display the import tree
    Tree(commands::tree::TreeArgs),

    /// Validate a project and everything it imports
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args),
            Commands::Options(args) => commands::options::execute(args),
            Commands::Tree(args) => commands::tree::execute(args),
            Commands::Validate(args) => commands::validate::execute(args),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_project_flags() {
        let cli = Cli::try_parse_from([
            "bundlekit",
            "resolve",
            "--project",
            "/ws/app",
            "--set",
            "env=prod",
            "--set",
            "region=eu",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.project.project, std::path::PathBuf::from("/ws/app"));
                assert_eq!(args.project.set.len(), 2);
                assert_eq!(args.format, commands::resolve::OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_rejects_malformed_set() {
        let result = Cli::try_parse_from(["bundlekit", "options", "--set", "novalue"]);
        assert!(result.is_err());
    }
}
