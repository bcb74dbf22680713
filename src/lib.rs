// Batchport - Segmented data export engine
// Copyright (c) 2025 Batchport Contributors
// Licensed under the MIT License

//! # Batchport - Segmented data export engine
//!
//! Batchport exports large entity sets (products, orders, customers...) from a
//! relational store into segmented files, then archives, deploys and reports
//! on them.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Loading** entities with keyset pagination below a ceiling taken at run start
//! - **Preloading** associated data once per page instead of once per entity
//! - **Segmenting** converted records by record count with a global limit
//! - **Writing** segments through pluggable output providers (CSV, JSON Lines)
//! - **Deploying** produced files to folders or HTTP endpoints
//! - **Recording** every run with its files, deployments and last error
//!
//! ## Architecture
//!
//! Batchport follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (export pipeline, deployment, run state)
//! - [`adapters`] - External integrations (PostgreSQL source, providers, profile storage)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and the per-run log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchport::adapters::source::PostgresSource;
//! use batchport::config::load_config;
//! use batchport::core::export::{ExportCoordinator, RunRequest};
//! use batchport::domain::ProfileId;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("batchport.toml")?;
//!     let source = Arc::new(PostgresSource::new(&config.source)?);
//!     let coordinator = ExportCoordinator::from_config(&config, source)?;
//!
//!     let request = RunRequest::new(ProfileId::new("products")?);
//!     let summary = coordinator.execute(request, CancellationToken::new()).await?;
//!
//!     println!("Exported {} records into {} files", summary.records_succeeded, summary.files.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Single-flight runs
//!
//! At most one run per profile is active in a process. A second request for
//! the same profile fails immediately with
//! [`BatchportError::LockContention`](domain::BatchportError::LockContention).
//!
//! ## Error Handling
//!
//! Batchport uses the [`domain::BatchportError`] type for all errors. Record
//! level failures are counted; once more than `max_record_failures` records
//! failed the run is aborted and its partial segment removed.
//!
//! ## Logging
//!
//! Batchport uses structured logging with the `tracing` crate; every run also
//! writes `run.log` into its export folder.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
