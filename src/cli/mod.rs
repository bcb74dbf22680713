//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for batchport using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Exit codes shared by every command
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Completed with record failures or non-fatal errors
    pub const PARTIAL: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    pub const LOCK_CONTENTION: i32 = 3;
    pub const CONNECTION: i32 = 4;
    pub const FATAL: i32 = 5;
    pub const CANCELLED: i32 = 130;
}

/// Batchport - Segmented data export engine
#[derive(Parser, Debug)]
#[command(name = "batchport")]
#[command(version, about, long_about = None)]
#[command(author = "Batchport Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "batchport.toml", env = "BATCHPORT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BATCHPORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one export profile
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show the last run of each profile
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["batchport", "run", "--profile", "products"]);
        assert_eq!(cli.config, "batchport.toml");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.profile, "products");
                assert_eq!(args.origin, "cli");
                assert!(!args.preview);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "batchport",
            "run",
            "--profile",
            "orders",
            "--entity-ids",
            "4,5",
            "--origin",
            "scheduler",
            "--preview",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.entity_ids.as_deref(), Some("4,5"));
        assert_eq!(args.origin, "scheduler");
        assert!(args.preview);
    }

    #[test]
    fn test_cli_parse_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "batchport",
            "--config",
            "custom.toml",
            "--log-level",
            "debug",
            "validate-config",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["batchport", "status", "--profile", "products"]);
        let Commands::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.profile.as_deref(), Some("products"));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["batchport", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
