//! Run command implementation
//!
//! Executes one export profile against the configured PostgreSQL source.

use crate::adapters::source::PostgresSource;
use crate::cli::exit_code;
use crate::config::load_config;
use crate::core::export::{ExportCoordinator, RunRequest, RunSummary};
use crate::core::state::RunStatus;
use crate::domain::ids::parse_entity_ids;
use crate::domain::{BatchportError, ProfileId};
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Export profile to run
    #[arg(short, long)]
    pub profile: String,

    /// Export only these entity ids (comma-separated)
    #[arg(long)]
    pub entity_ids: Option<String>,

    /// Tag recorded with the run
    #[arg(long, default_value = "cli")]
    pub origin: String,

    /// Write the output to stdout instead of files; skips deployment
    #[arg(long)]
    pub preview: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        tracing::info!(profile_id = %self.profile, "Starting run command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let profile_id = match ProfileId::new(&self.profile) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("❌ Invalid profile id: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let entity_ids = match self.entity_ids.as_deref().map(parse_entity_ids).transpose() {
            Ok(ids) => ids.unwrap_or_default(),
            Err(e) => {
                eprintln!("❌ Invalid --entity-ids: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };
        if !entity_ids.is_empty() {
            tracing::info!(count = entity_ids.len(), "Overriding entity ids from CLI");
        }

        let source = match PostgresSource::new(&config.source) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };
        if let Err(e) = source.test_connection().await {
            tracing::error!(error = %e, "Failed to connect to source database");
            eprintln!("❌ Failed to connect to {}: {e}", source.display_name());
            return Ok(exit_code::CONNECTION);
        }

        let coordinator = ExportCoordinator::from_config(&config, Arc::new(source))?;

        let mut request = RunRequest::new(profile_id)
            .with_entity_ids(entity_ids)
            .with_origin(self.origin.as_str());
        if self.preview {
            request = request.preview();
        }

        if !self.preview {
            println!("🚀 Running export profile '{}'...", self.profile);
            println!();
        }

        match coordinator.execute(request, cancel).await {
            Ok(summary) => {
                if self.preview {
                    print_preview(&summary);
                } else {
                    print_summary(&summary);
                }
                Ok(exit_code_for(&summary))
            }
            Err(e) => {
                let code = exit_code_for_error(&e);
                if code == exit_code::CANCELLED {
                    println!();
                    println!("⚠️  Export cancelled. Partial output of the last segment was removed.");
                } else {
                    tracing::error!(error = %e, "Export run failed");
                    eprintln!("❌ {e}");
                }
                Ok(code)
            }
        }
    }
}

fn print_preview(summary: &RunSummary) {
    if let Some(contents) = &summary.preview_output {
        print!("{}", String::from_utf8_lossy(contents));
    }
    eprintln!(
        "Preview: {} records, {} failed",
        summary.records_succeeded, summary.records_failed
    );
}

fn print_summary(summary: &RunSummary) {
    println!("📊 Export Summary:");
    println!("  Run: {}", summary.run_id);
    println!("  Status: {}", summary.status);
    println!("  Records exported: {}", summary.records_succeeded);
    println!("  Records failed: {}", summary.records_failed);
    println!("  Segments: {}", summary.segments);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());

    if !summary.files.is_empty() {
        println!();
        println!("📁 Files:");
        for file in &summary.files {
            println!("  - {} ({} records, {} bytes)", file.file_name, file.records, file.size_bytes);
        }
    }
    if let Some(zip) = &summary.zip {
        println!("  Archive: {}", zip.file_name);
    }

    if !summary.deployments.is_empty() {
        println!();
        println!("🚚 Deployments:");
        for deployment in &summary.deployments {
            let mark = if deployment.success { "✅" } else { "❌" };
            println!(
                "  {mark} {} ({}): {} file(s)",
                deployment.name, deployment.kind, deployment.files_published
            );
            if let Some(message) = &deployment.message {
                println!("     {message}");
            }
        }
    }

    if !summary.errors.is_empty() {
        println!();
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
    }

    println!();
    match summary.status {
        RunStatus::Succeeded if summary.is_clean() => println!("✅ Export completed successfully!"),
        RunStatus::Succeeded => println!("⚠️  Export completed with failures"),
        _ => println!(
            "❌ Export {}: {}",
            summary.status,
            summary.last_error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Exit code of a finished run
pub fn exit_code_for(summary: &RunSummary) -> i32 {
    match summary.status {
        RunStatus::Succeeded if summary.is_clean() => exit_code::SUCCESS,
        RunStatus::Succeeded => exit_code::PARTIAL,
        RunStatus::Cancelled => exit_code::CANCELLED,
        _ => exit_code::FATAL,
    }
}

/// Exit code of a run that could not start or was cancelled
pub fn exit_code_for_error(error: &BatchportError) -> i32 {
    match error {
        BatchportError::LockContention { .. } => exit_code::LOCK_CONTENTION,
        BatchportError::Cancelled => exit_code::CANCELLED,
        BatchportError::Configuration(_)
        | BatchportError::Validation(_)
        | BatchportError::NotFound(_) => exit_code::CONFIGURATION,
        BatchportError::Source(_) => exit_code::CONNECTION,
        _ => exit_code::FATAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(BatchportError::LockContention { profile_id: "p".into() }, 3 ; "lock contention")]
    #[test_case(BatchportError::Cancelled, 130 ; "cancelled")]
    #[test_case(BatchportError::NotFound("profile".into()), 2 ; "unknown profile")]
    #[test_case(BatchportError::Validation("bad".into()), 2 ; "invalid profile")]
    #[test_case(BatchportError::Source("down".into()), 4 ; "source down")]
    #[test_case(BatchportError::Io("disk".into()), 5 ; "fatal")]
    fn test_exit_code_for_error(error: BatchportError, expected: i32) {
        assert_eq!(exit_code_for_error(&error), expected);
    }
}
