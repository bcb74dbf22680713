//! In-process entity source
//!
//! Holds entities in an ordered map and counts every call, which makes it the
//! source of choice for tests and for embedders that already have their data
//! in memory. Rows can be inserted or deleted while a run is in progress to
//! reproduce concurrent changes.

use super::traits::{EntitySource, PageCursor, SourceQuery};
use crate::domain::entity::{Associations, EntityKind, SourceEntity, Store};
use crate::domain::ids::EntityId;
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryData {
    entities: BTreeMap<EntityId, SourceEntity>,
    associations: HashMap<EntityId, Associations>,
    stores: Vec<Store>,
    statuses: HashMap<EntityId, String>,
}

/// Call counters of a [`MemorySource`]
#[derive(Debug, Default)]
pub struct SourceCalls {
    pub fetch_page: AtomicUsize,
    pub fetch_children: AtomicUsize,
    pub fetch_associations: AtomicUsize,
    pub mark_exported: AtomicUsize,
}

/// Entity source backed by memory
#[derive(Default)]
pub struct MemorySource {
    data: Mutex<MemoryData>,
    calls: SourceCalls,
    fail_pages_after: Mutex<Option<usize>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source with `count` entities of `kind`, ids `1..=count`
    ///
    /// Every entity carries a `name` field.
    pub fn with_sequence(kind: EntityKind, count: i64) -> Self {
        let source = Self::new();
        for id in 1..=count {
            source.insert(
                SourceEntity::new(EntityId::new(id), kind).with_field("name", format!("{kind}-{id}")),
            );
        }
        source
    }

    fn data(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts or replaces an entity
    pub fn insert(&self, entity: SourceEntity) {
        self.data().entities.insert(entity.id, entity);
    }

    /// Removes an entity, returning whether it existed
    pub fn delete(&self, id: EntityId) -> bool {
        self.data().entities.remove(&id).is_some()
    }

    pub fn set_associations(&self, id: EntityId, associations: Associations) {
        self.data().associations.insert(id, associations);
    }

    pub fn add_store(&self, store: Store) {
        self.data().stores.push(store);
    }

    /// Status written by [`EntitySource::mark_exported`]
    pub fn status_of(&self, id: EntityId) -> Option<String> {
        self.data().statuses.get(&id).cloned()
    }

    /// Makes every `fetch_page` call after the first `pages` fail
    pub fn fail_pages_after(&self, pages: usize) {
        *self.fail_pages_after.lock().unwrap_or_else(|e| e.into_inner()) = Some(pages);
    }

    pub fn calls(&self) -> &SourceCalls {
        &self.calls
    }

    pub fn page_calls(&self) -> usize {
        self.calls.fetch_page.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitySource for MemorySource {
    async fn stores(&self) -> Result<Vec<Store>> {
        Ok(self.data().stores.clone())
    }

    async fn count(&self, query: &SourceQuery) -> Result<u64> {
        let data = self.data();
        Ok(data.entities.values().filter(|e| query.matches(e)).count() as u64)
    }

    async fn max_id(&self, query: &SourceQuery) -> Result<Option<EntityId>> {
        let data = self.data();
        Ok(data
            .entities
            .values()
            .rev()
            .find(|e| query.matches(e))
            .map(|e| e.id))
    }

    async fn fetch_page(
        &self,
        query: &SourceQuery,
        cursor: PageCursor,
        page_size: usize,
    ) -> Result<Vec<SourceEntity>> {
        let call = self.calls.fetch_page.fetch_add(1, Ordering::SeqCst);
        let limit = *self.fail_pages_after.lock().unwrap_or_else(|e| e.into_inner());
        if limit.is_some_and(|pages| call >= pages) {
            return Err(BatchportError::Source(format!(
                "Simulated failure loading page {}",
                call + 1
            )));
        }

        let data = self.data();
        let matching = data.entities.values().filter(|e| query.matches(e));
        let page = match cursor {
            PageCursor::Start { skip } => matching
                .skip(usize::try_from(skip).unwrap_or(usize::MAX))
                .take(page_size)
                .cloned()
                .collect(),
            PageCursor::After(last_id) => matching
                .filter(|e| e.id > last_id)
                .take(page_size)
                .cloned()
                .collect(),
        };
        Ok(page)
    }

    async fn fetch_children(
        &self,
        kind: EntityKind,
        parent_ids: &[EntityId],
    ) -> Result<Vec<SourceEntity>> {
        self.calls.fetch_children.fetch_add(1, Ordering::SeqCst);
        let data = self.data();
        Ok(data
            .entities
            .values()
            .filter(|e| e.kind == kind && e.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect())
    }

    async fn fetch_associations(
        &self,
        _kind: EntityKind,
        ids: &[EntityId],
        _language: &str,
    ) -> Result<HashMap<EntityId, Associations>> {
        self.calls.fetch_associations.fetch_add(1, Ordering::SeqCst);
        let data = self.data();
        Ok(ids
            .iter()
            .filter_map(|id| data.associations.get(id).map(|a| (*id, a.clone())))
            .collect())
    }

    async fn mark_exported(
        &self,
        _kind: EntityKind,
        ids: &[EntityId],
        status: &str,
    ) -> Result<u64> {
        self.calls.mark_exported.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data();
        let mut updated = 0;
        for id in ids {
            if data.entities.contains_key(id) {
                data.statuses.insert(*id, status.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyset_pages() {
        let source = MemorySource::with_sequence(EntityKind::Order, 25);
        let query = SourceQuery::new(EntityKind::Order);

        let first = source
            .fetch_page(&query, PageCursor::Start { skip: 5 }, 10)
            .await
            .unwrap();
        assert_eq!(first.first().unwrap().id, EntityId::new(6));
        assert_eq!(first.len(), 10);

        let next = source
            .fetch_page(&query, PageCursor::After(EntityId::new(15)), 10)
            .await
            .unwrap();
        assert_eq!(next.first().unwrap().id, EntityId::new(16));
        assert_eq!(source.page_calls(), 2);
    }

    #[tokio::test]
    async fn test_ceiling_excludes_new_rows() {
        let source = MemorySource::with_sequence(EntityKind::Order, 3);
        let query = SourceQuery::new(EntityKind::Order);
        let ceiling = source.max_id(&query).await.unwrap();
        assert_eq!(ceiling, Some(EntityId::new(3)));

        source.insert(SourceEntity::new(EntityId::new(4), EntityKind::Order));
        let page = source
            .fetch_page(&query.with_ceiling(ceiling), PageCursor::After(EntityId::new(2)), 10)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_page_failure() {
        let source = MemorySource::with_sequence(EntityKind::Order, 3);
        source.fail_pages_after(1);
        let query = SourceQuery::new(EntityKind::Order);

        assert!(source
            .fetch_page(&query, PageCursor::Start { skip: 0 }, 1)
            .await
            .is_ok());
        assert!(source
            .fetch_page(&query, PageCursor::After(EntityId::new(1)), 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_mark_exported() {
        let source = MemorySource::with_sequence(EntityKind::Order, 2);
        let updated = source
            .mark_exported(EntityKind::Order, &[EntityId::new(1), EntityId::new(9)], "exported")
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(source.status_of(EntityId::new(1)).as_deref(), Some("exported"));
    }
}
