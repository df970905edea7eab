//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Anvil using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Anvil - equipment test record migration engine
#[derive(Parser, Debug)]
#[command(name = "anvil")]
#[command(version, about, long_about = None)]
#[command(author = "Anvil Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "anvil.toml", env = "ANVIL_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ANVIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the migration engines for the configured families
    Run(commands::run::RunArgs),

    /// Show each family's checkpoint state
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["anvil", "run"]);
        assert_eq!(cli.config, "anvil.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["anvil", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["anvil", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "anvil",
            "run",
            "--family",
            "fastening",
            "--batch-size",
            "50",
            "--limit",
            "1000",
            "--no-resume",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.family.as_deref(), Some("fastening"));
                assert_eq!(args.batch_size, Some(50));
                assert_eq!(args.limit, Some(1000));
                assert!(args.no_resume);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["anvil", "status"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["anvil", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["anvil", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
