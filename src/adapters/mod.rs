//! External system integrations for batchport.
//!
//! - [`source`] - Entity sources (PostgreSQL, in-memory)
//! - [`providers`] - Output providers (CSV, JSON Lines)
//! - [`profiles`] - Export profile and run record storage
//!
//! # Design Pattern
//!
//! Adapters sit behind traits so the export engine can be tested against
//! in-memory implementations:
//!
//! ```rust
//! use batchport::adapters::source::{EntitySource, MemorySource};
//! use batchport::domain::EntityKind;
//! use std::sync::Arc;
//!
//! let source: Arc<dyn EntitySource> = Arc::new(MemorySource::with_sequence(EntityKind::Product, 3));
//! # let _ = source;
//! ```

pub mod profiles;
pub mod providers;
pub mod source;
