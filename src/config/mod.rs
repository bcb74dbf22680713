//! Configuration management for batchport.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! batchport uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BATCHPORT_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation of every section and every export profile
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batchport::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("batchport.toml")?;
//!
//! println!("Output folder: {}", config.export.output_dir);
//! for profile in &config.profiles {
//!     println!("Profile {} exports {}", profile.id, profile.entity_kind);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`SourceConfig`] - PostgreSQL entity source
//! - [`ExportConfig`] - Output folder, page size, flush threshold, failure threshold
//! - [`StateConfig`] - Run record persistence
//! - [`LoggingConfig`] - Logging configuration
//! - `[[profiles]]` - Export profiles
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! connection_string = "${BATCHPORT_SOURCE_URL}"
//!
//! [export]
//! output_dir = "./exports"
//! page_size = 500
//!
//! [[profiles]]
//! id = "products-feed"
//! entity_kind = "product"
//! provider = "csv"
//! batch_size = 5000
//! create_zip = true
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, BatchportConfig, ExportConfig, LoggingConfig, SourceConfig, StateConfig,
    DEFAULT_FLUSH_THRESHOLD_BYTES, DEFAULT_MAX_RECORD_FAILURES,
};
pub use secret::{
    redact_connection_string, secret_string, secret_string_opt, SecretString, SecretValue,
};
