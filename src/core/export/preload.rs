//! Batch preloading
//!
//! After every page load the preloader fetches the associated data of exactly
//! that page in one round trip. Converters read from the resulting cache and
//! never query the source per entity.

use crate::adapters::source::EntitySource;
use crate::domain::entity::{Associations, EntityKind, SourceEntity};
use crate::domain::ids::EntityId;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Associated data of the current page, keyed by entity id
pub type BatchCache = HashMap<EntityId, Associations>;

/// Page-loaded hook
#[async_trait]
pub trait BatchPreloader: Send + Sync {
    /// Loads associated data for the entities of one page
    async fn on_page_loaded(
        &self,
        kind: EntityKind,
        language: &str,
        entities: &[SourceEntity],
    ) -> Result<BatchCache>;
}

/// Preloader that asks the entity source for associations
pub struct SourcePreloader {
    source: Arc<dyn EntitySource>,
}

impl SourcePreloader {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl BatchPreloader for SourcePreloader {
    async fn on_page_loaded(
        &self,
        kind: EntityKind,
        language: &str,
        entities: &[SourceEntity],
    ) -> Result<BatchCache> {
        if entities.is_empty() {
            return Ok(BatchCache::new());
        }

        let ids: Vec<EntityId> = entities.iter().map(|e| e.id).collect();
        let cache = self.source.fetch_associations(kind, &ids, language).await?;

        tracing::trace!(
            kind = %kind,
            entities = ids.len(),
            cached = cache.len(),
            "Preloaded page associations"
        );
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::MemorySource;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_one_call_per_page() {
        let source = Arc::new(MemorySource::with_sequence(EntityKind::Product, 3));
        source.set_associations(
            EntityId::new(2),
            Associations {
                categories: vec!["Shoes".to_string()],
                ..Default::default()
            },
        );
        let preloader = SourcePreloader::new(source.clone());

        let entities: Vec<_> = (1..=3)
            .map(|id| SourceEntity::new(EntityId::new(id), EntityKind::Product))
            .collect();
        let cache = preloader
            .on_page_loaded(EntityKind::Product, "en", &entities)
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache[&EntityId::new(2)].categories, vec!["Shoes"]);
        assert_eq!(source.calls().fetch_associations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_page_skips_source() {
        let source = Arc::new(MemorySource::new());
        let preloader = SourcePreloader::new(source.clone());

        let cache = preloader
            .on_page_loaded(EntityKind::Product, "en", &[])
            .await
            .unwrap();
        assert!(cache.is_empty());
        assert_eq!(source.calls().fetch_associations.load(Ordering::SeqCst), 0);
    }
}
