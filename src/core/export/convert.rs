//! Record conversion
//!
//! A converter turns one loaded entity into zero or more flat export records.
//! It reads associated data only from the batch cache of the current page.

use crate::core::export::preload::BatchCache;
use crate::domain::entity::{EntityKind, SourceEntity, Store};
use crate::domain::profile::ExportProjection;
use crate::domain::record::{ExportRecord, FieldValue};
use crate::domain::Result;

/// Fields never written for customers
const CUSTOMER_SECRET_FIELDS: [&str; 3] = ["password", "password_hash", "password_salt"];

/// Read-only view of the run handed to a converter
#[derive(Debug, Clone, Copy)]
pub struct ConvertContext<'a> {
    pub store: &'a Store,
    pub language: &'a str,
    pub projection: &'a ExportProjection,
    pub cache: &'a BatchCache,
}

/// Entity to record conversion
pub trait RecordConverter: Send + Sync {
    /// Converts one entity
    ///
    /// # Errors
    ///
    /// A failure is counted against the entity; the run continues until the
    /// failure threshold is crossed.
    fn convert(&self, entity: &SourceEntity, ctx: &ConvertContext<'_>)
        -> Result<Vec<ExportRecord>>;
}

/// Default converter: one flat record per entity
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRecordConverter;

impl FlatRecordConverter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordConverter for FlatRecordConverter {
    fn convert(
        &self,
        entity: &SourceEntity,
        ctx: &ConvertContext<'_>,
    ) -> Result<Vec<ExportRecord>> {
        let store_id = entity.store_id.unwrap_or(ctx.store.id);
        let mut record = ExportRecord::new(entity.id, entity.kind, store_id, ctx.language);
        record.parent_id = entity.parent_id;

        for (name, value) in &entity.fields {
            if entity.kind == EntityKind::Customer && CUSTOMER_SECRET_FIELDS.contains(&name.as_str())
            {
                continue;
            }
            record.set(name.clone(), value.clone());
        }
        record.set("created_at", entity.created_at.to_rfc3339());
        if let Some(updated_at) = entity.updated_at {
            record.set("updated_at", updated_at.to_rfc3339());
        }

        let Some(associations) = ctx.cache.get(&entity.id) else {
            return Ok(vec![record]);
        };

        if let Some(localized) = associations.localized_for(ctx.language) {
            for (name, value) in localized {
                record.set(name.clone(), value.clone());
            }
        }

        let projection = ctx.projection;
        if projection.include_attributes {
            for (name, value) in &associations.attributes {
                record.set(format!("attr.{name}"), value.clone());
            }
        }
        if projection.include_categories && !associations.categories.is_empty() {
            record.set("categories", associations.categories.clone());
        }
        if projection.include_media && !associations.media.is_empty() {
            let take = match projection.max_media {
                0 => associations.media.len(),
                max => max,
            };
            let media: Vec<FieldValue> = associations
                .media
                .iter()
                .take(take)
                .map(|url| FieldValue::Text(url.clone()))
                .collect();
            record.set("media", FieldValue::List(media));
        }

        Ok(vec![record])
    }
}
