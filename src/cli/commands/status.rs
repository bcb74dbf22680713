//! Status command implementation
//!
//! Lists the last persisted run of each profile.

use crate::adapters::profiles::FileProfileStore;
use crate::cli::exit_code;
use crate::config::load_config;
use crate::core::state::{RunStatus, StateManager};
use clap::Args;
use std::sync::Arc;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this profile
    #[arg(long)]
    pub profile: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        println!("📊 Export Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let state_manager =
            StateManager::new_with_store(Arc::new(FileProfileStore::from_config(&config)));

        let records = match state_manager.all_run_records().await {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to load run records");
                println!("   Error: {e}");
                return Ok(exit_code::FATAL);
            }
        };

        let records: Vec<_> = records
            .into_iter()
            .filter(|r| {
                self.profile
                    .as_deref()
                    .map_or(true, |p| r.profile_id.as_str() == p)
            })
            .collect();

        if records.is_empty() {
            println!("No export history found.");
            println!("Run 'batchport run --profile <id>' to start exporting data.");
            return Ok(exit_code::SUCCESS);
        }

        println!(
            "{:<24} {:<15} {:<10} {:<8} {:<8} {:<20} {:<}",
            "Profile", "Status", "Records", "Failed", "Files", "Finished", "Last Error"
        );
        println!("{}", "-".repeat(110));

        for record in records {
            let status = match record.status {
                RunStatus::Succeeded => "✅ Succeeded",
                RunStatus::InProgress => "🔄 In Progress",
                RunStatus::Failed => "❌ Failed",
                RunStatus::Aborted => "❌ Aborted",
                RunStatus::Cancelled => "⏸️  Cancelled",
            };
            let finished = record
                .completed_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());

            println!(
                "{:<24} {:<15} {:<10} {:<8} {:<8} {:<20} {:<}",
                record.profile_id.as_str(),
                status,
                record.records_succeeded,
                record.records_failed,
                record.files.len(),
                finished,
                record.last_error.as_deref().unwrap_or("")
            );
        }

        println!();
        Ok(exit_code::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_args_filter() {
        let args = StatusArgs {
            profile: Some("products".to_string()),
        };
        assert_eq!(args.profile.as_deref(), Some("products"));
    }
}
