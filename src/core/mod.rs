//! Core business logic for batchport.
//!
//! # Modules
//!
//! - [`export`] - Cursor loading, segmentation, output providers and orchestration
//! - [`deploy`] - Publishing produced files and completion notifications
//! - [`state`] - Persisted run records
//!
//! # Export Workflow
//!
//! 1. **Lock**: Take the single-flight lock of the profile
//! 2. **Load**: Page through the source by ascending id below the run's ceiling
//! 3. **Preload**: Fetch associated data once per page
//! 4. **Segment**: Convert entities and cut them into bounded segments
//! 5. **Write**: Hand each segment to the output provider, one file per segment
//! 6. **Post-process**: Zip, deploy, notify, update order status, clean up
//! 7. **Finalize**: Persist the run record and `run.log`
//!
//! # Example
//!
//! ```rust,no_run
//! use batchport::adapters::source::PostgresSource;
//! use batchport::config::load_config;
//! use batchport::core::export::{ExportCoordinator, RunRequest};
//! use batchport::domain::ProfileId;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("batchport.toml")?;
//! let source = Arc::new(PostgresSource::new(&config.source)?);
//! let coordinator = ExportCoordinator::from_config(&config, source)?;
//!
//! let request = RunRequest::new(ProfileId::new("products")?).with_origin("scheduler");
//! let summary = coordinator.execute(request, CancellationToken::new()).await?;
//!
//! println!("Exported {} records", summary.records_succeeded);
//! # Ok(())
//! # }
//! ```

pub mod deploy;
pub mod export;
pub mod state;
