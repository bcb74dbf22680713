//! Validate config command implementation

use crate::cli::exit_code;
use crate::config::{load_config, redact_connection_string};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading validates every section and profile
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Source: {} (schema {})",
            redact_connection_string(&config.source.connection_string),
            config.source.schema
        );
        println!("  Max Connections: {}", config.source.max_connections);
        println!("  Output Directory: {}", config.export.output_dir);
        println!("  Page Size: {}", config.export.page_size);
        println!("  Flush Threshold: {} bytes", config.export.flush_threshold_bytes);
        println!("  Max Record Failures: {}", config.export.max_record_failures);
        println!("  State Directory: {}", config.state.state_dir);
        println!();

        if config.profiles.is_empty() {
            println!("⚠️  No export profiles configured");
        } else {
            println!("Profiles:");
            for profile in &config.profiles {
                println!(
                    "  - {} ({}, {}{}): {} deployment(s)",
                    profile.id,
                    profile.entity_kind,
                    profile.provider,
                    if profile.enabled { "" } else { ", disabled" },
                    profile.enabled_deployments().count()
                );
            }
        }
        println!();
        Ok(exit_code::SUCCESS)
    }
}
