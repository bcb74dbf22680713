//! Entity source abstraction
//!
//! The source is the database boundary of the export engine. The cursor
//! loader pages through it by ascending id, the batch preloader asks it for
//! the associated data of exactly one page, and the orchestrator uses it for
//! the post-run bulk status update.

use crate::domain::entity::{Associations, EntityKind, SourceEntity, Store};
use crate::domain::ids::{EntityId, StoreId};
use crate::domain::profile::ExportProfile;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Position of a page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// First page; skips `skip` matching rows
    Start { skip: u64 },
    /// Every later page; rows with `id > last_id`
    After(EntityId),
}

/// Row selection shared by every source call of a run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub kind: EntityKind,

    /// Restrict to rows of one store (rows without a store match every store)
    pub store_id: Option<StoreId>,

    /// Explicit id subset (empty = all)
    pub entity_ids: Vec<EntityId>,

    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,

    /// Only rows without a parent; children are reached through expansion
    pub parents_only: bool,

    /// Highest id a page may return (the snapshot taken at run start)
    pub ceiling: Option<EntityId>,
}

impl SourceQuery {
    /// An unfiltered query for `kind`
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            store_id: None,
            entity_ids: Vec::new(),
            created_from: None,
            created_to: None,
            is_active: None,
            parents_only: kind.supports_child_expansion(),
            ceiling: None,
        }
    }

    /// Builds the query of a profile run against one store
    ///
    /// `entity_ids` overrides the profile's own id subset when non-empty.
    /// Children are only matched directly when an explicit subset is given.
    pub fn for_profile(
        profile: &ExportProfile,
        entity_ids: &[EntityId],
        store_id: Option<StoreId>,
    ) -> Self {
        let filter = &profile.filter;
        let entity_ids = if entity_ids.is_empty() {
            filter.entity_ids.clone()
        } else {
            entity_ids.to_vec()
        };
        Self {
            store_id: store_id.or(filter.store_id),
            // An explicit subset may name children directly
            parents_only: profile.entity_kind.supports_child_expansion() && entity_ids.is_empty(),
            entity_ids,
            created_from: filter.created_from,
            created_to: filter.created_to,
            is_active: filter.is_active,
            ..Self::new(profile.entity_kind)
        }
    }

    pub fn with_ceiling(mut self, ceiling: Option<EntityId>) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Whether an entity satisfies every filter of the query (ceiling included)
    pub fn matches(&self, entity: &SourceEntity) -> bool {
        if entity.kind != self.kind {
            return false;
        }
        if self.parents_only && entity.parent_id.is_some() {
            return false;
        }
        if let (Some(wanted), Some(actual)) = (self.store_id, entity.store_id) {
            if wanted != actual {
                return false;
            }
        }
        if !self.entity_ids.is_empty() && !self.entity_ids.contains(&entity.id) {
            return false;
        }
        if self.created_from.is_some_and(|from| entity.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| entity.created_at > to) {
            return false;
        }
        if let Some(active) = self.is_active {
            let entity_active = !matches!(
                entity.field("is_active"),
                Some(crate::domain::FieldValue::Bool(false))
            );
            if entity_active != active {
                return false;
            }
        }
        if self.ceiling.is_some_and(|ceiling| entity.id > ceiling) {
            return false;
        }
        true
    }
}

/// Database boundary of the export engine
///
/// Implementations must return pages ordered by ascending id and must never
/// return a row above `query.ceiling`.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Stores known to the source (may be empty)
    async fn stores(&self) -> Result<Vec<Store>>;

    /// Number of rows matching the query
    async fn count(&self, query: &SourceQuery) -> Result<u64>;

    /// Highest id matching the query, `None` when nothing matches
    async fn max_id(&self, query: &SourceQuery) -> Result<Option<EntityId>>;

    /// Loads one page ordered by id ascending
    ///
    /// # Arguments
    ///
    /// * `query` - Row selection, including the id ceiling
    /// * `cursor` - Offset skip for the first page, `id > last_id` afterwards
    /// * `page_size` - Maximum number of rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn fetch_page(
        &self,
        query: &SourceQuery,
        cursor: PageCursor,
        page_size: usize,
    ) -> Result<Vec<SourceEntity>>;

    /// Loads the children of a batch of parents in one call, ordered by id
    async fn fetch_children(
        &self,
        kind: EntityKind,
        parent_ids: &[EntityId],
    ) -> Result<Vec<SourceEntity>>;

    /// Loads associated data for a batch of entities in one call
    ///
    /// Entities without associated data may be missing from the map.
    async fn fetch_associations(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
        language: &str,
    ) -> Result<HashMap<EntityId, Associations>>;

    /// Writes `status` to every listed entity; returns the affected row count
    async fn mark_exported(&self, kind: EntityKind, ids: &[EntityId], status: &str)
        -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ProfileId;

    #[test]
    fn test_query_for_profile_override_ids() {
        let mut profile = ExportProfile::new(
            ProfileId::new("orders").unwrap(),
            EntityKind::Order,
            "csv",
        );
        profile.filter.entity_ids = vec![EntityId::new(1)];
        profile.filter.store_id = Some(StoreId::new(3));

        let query = SourceQuery::for_profile(&profile, &[], None);
        assert_eq!(query.entity_ids, vec![EntityId::new(1)]);
        assert_eq!(query.store_id, Some(StoreId::new(3)));
        assert!(!query.parents_only);

        let query = SourceQuery::for_profile(&profile, &[EntityId::new(9)], Some(StoreId::new(1)));
        assert_eq!(query.entity_ids, vec![EntityId::new(9)]);
        assert_eq!(query.store_id, Some(StoreId::new(1)));
    }

    #[test]
    fn test_query_matches() {
        let query = SourceQuery::new(EntityKind::Product).with_ceiling(Some(EntityId::new(10)));

        let parent = SourceEntity::new(EntityId::new(5), EntityKind::Product);
        let child = SourceEntity::new(EntityId::new(6), EntityKind::Product)
            .with_parent(EntityId::new(5));
        let above = SourceEntity::new(EntityId::new(11), EntityKind::Product);
        let order = SourceEntity::new(EntityId::new(7), EntityKind::Order);

        assert!(query.matches(&parent));
        assert!(!query.matches(&child));
        assert!(!query.matches(&above));
        assert!(!query.matches(&order));
    }

    #[test]
    fn test_query_store_and_active_filters() {
        let mut query = SourceQuery::new(EntityKind::Customer);
        query.store_id = Some(StoreId::new(1));
        query.is_active = Some(true);

        let shared = SourceEntity::new(EntityId::new(1), EntityKind::Customer);
        let other_store =
            SourceEntity::new(EntityId::new(2), EntityKind::Customer).with_store(StoreId::new(2));
        let inactive = SourceEntity::new(EntityId::new(3), EntityKind::Customer)
            .with_field("is_active", false);

        assert!(query.matches(&shared));
        assert!(!query.matches(&other_store));
        assert!(!query.matches(&inactive));
    }
}
