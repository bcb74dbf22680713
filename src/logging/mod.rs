//! Logging and observability
//!
//! This module provides:
//! - Console and JSON file logging with rotation ([`init_logging`])
//! - The per-run textual log persisted next to the export files ([`RunLog`])
//! - Macros for the recurring run events
//!
//! # Example
//!
//! ```no_run
//! use batchport::logging::init_logging;
//! use batchport::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(profile_id = "products", "Application started");
//! ```

pub mod run_log;
pub mod structured;

// Re-export commonly used items
pub use run_log::{RunLog, RunLogLevel, RUN_LOG_FILE_NAME};
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of an export run
///
/// # Example
///
/// ```no_run
/// use batchport::log_run_start;
///
/// let run_id = "2b1f";
/// log_run_start!("products", run_id, "csv");
/// ```
#[macro_export]
macro_rules! log_run_start {
    ($profile_id:expr, $run_id:expr, $provider:expr) => {
        tracing::info!(
            profile_id = %$profile_id,
            run_id = %$run_id,
            provider = %$provider,
            "Starting export run"
        );
    };
}

/// Log the completion of an export run
///
/// # Example
///
/// ```no_run
/// use batchport::log_run_complete;
/// use std::time::Duration;
///
/// log_run_complete!("products", 1200u64, 3usize, Duration::from_secs(4));
/// ```
#[macro_export]
macro_rules! log_run_complete {
    ($profile_id:expr, $records:expr, $files:expr, $duration:expr) => {
        tracing::info!(
            profile_id = %$profile_id,
            records = $records,
            files = $files,
            duration_ms = $duration.as_millis() as u64,
            "Export run completed"
        );
    };
}

/// Log progress after a segment was written
///
/// # Example
///
/// ```no_run
/// use batchport::log_segment_progress;
///
/// log_segment_progress!(0i64, 2u32, 3000u64, 10000u64);
/// ```
#[macro_export]
macro_rules! log_segment_progress {
    ($store_id:expr, $segment:expr, $converted:expr, $total:expr) => {
        tracing::debug!(
            store_id = %$store_id,
            segment = $segment,
            converted = $converted,
            total = $total,
            progress_pct = if $total > 0 {
                $converted as f64 / $total as f64 * 100.0
            } else {
                100.0
            },
            "Segment written"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use batchport::log_error_with_context;
/// use batchport::domain::BatchportError;
///
/// let error = BatchportError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
