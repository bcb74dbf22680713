//! Domain models and types for batchport.
//!
//! This module contains the core domain types shared by every layer.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ProfileId`], [`EntityId`], [`StoreId`])
//! - **Source entities** ([`SourceEntity`], [`Associations`], [`Store`])
//! - **Export records** ([`ExportRecord`], [`FieldValue`])
//! - **Export profiles** ([`ExportProfile`] and its filter, projection and targets)
//! - **Error types** ([`BatchportError`]) and the [`Result`] alias
//!
//! # Type Safety
//!
//! Identifiers are newtypes so a store id can never be passed as a cursor:
//!
//! ```rust
//! use batchport::domain::{EntityId, StoreId};
//!
//! let cursor = EntityId::new(100);
//! let store = StoreId::new(1);
//! // let wrong: EntityId = store; // Compile error
//! assert!(cursor > EntityId::new(99));
//! # let _ = store;
//! ```
//!
//! # Records
//!
//! Converters emit records with a typed core and an open field map:
//!
//! ```rust
//! use batchport::domain::{EntityId, EntityKind, ExportRecord, StoreId};
//!
//! let mut record = ExportRecord::new(EntityId::new(7), EntityKind::Product, StoreId::new(0), "en");
//! record.set("sku", "A-7");
//! record.set("price", 19.5);
//! assert_eq!(record.fields.len(), 2);
//! ```

pub mod entity;
pub mod errors;
pub mod ids;
pub mod profile;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use entity::{Associations, EntityKind, SourceEntity, Store};
pub use errors::{BatchportError, RecordFailure};
pub use ids::{EntityId, ProfileId, StoreId};
pub use profile::{
    ChildExpansion, DeploymentKind, DeploymentTarget, ExportFilter, ExportProfile,
    ExportProjection, NotificationTarget,
};
pub use record::{ExportRecord, FieldValue};
pub use result::Result;
