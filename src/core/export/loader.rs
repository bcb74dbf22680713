//! Cursor entity loader
//!
//! Pages through the source by ascending id. The first page skips the
//! profile offset, every later page asks for `id > last_id`. End of data is
//! decided against the `max_id` snapshot taken when the store started, so
//! rows inserted above that ceiling during the run are never picked up.
//! Rows deleted while the run is in progress are skipped.

use crate::adapters::source::{EntitySource, PageCursor, SourceQuery};
use crate::core::export::context::RunContext;
use crate::domain::entity::{EntityKind, SourceEntity};
use crate::domain::ids::EntityId;
use crate::domain::profile::ChildExpansion;
use crate::domain::{BatchportError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Customers with this flag are skipped unless the projection keeps them
const SYSTEM_ACCOUNT_FLAG: &str = "is_system_account";

/// Keyset paginator over one store
pub struct CursorLoader {
    source: Arc<dyn EntitySource>,
    query: SourceQuery,
    page_size: usize,
    offset: u64,
    max_id: Option<EntityId>,
    last_id: Option<EntityId>,
    available_rows: u64,
    rows_loaded: u64,
    pages_loaded: u64,
}

impl CursorLoader {
    /// Creates a loader
    ///
    /// # Arguments
    ///
    /// * `query` - Row selection; its `ceiling` is the `max_id` snapshot
    /// * `page_size` - Rows per source call
    /// * `offset` - Rows skipped before the first page
    /// * `total_rows` - Matching rows counted at store start
    pub fn new(
        source: Arc<dyn EntitySource>,
        query: SourceQuery,
        page_size: usize,
        offset: u64,
        total_rows: u64,
    ) -> Self {
        Self {
            source,
            max_id: query.ceiling,
            query,
            page_size: page_size.max(1),
            offset,
            last_id: None,
            available_rows: total_rows.saturating_sub(offset),
            rows_loaded: 0,
            pages_loaded: 0,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.query.kind
    }

    /// Rows left after the offset
    pub fn available_rows(&self) -> u64 {
        self.available_rows
    }

    /// Source rows returned so far (before expansion and filtering)
    pub fn rows_loaded(&self) -> u64 {
        self.rows_loaded
    }

    pub fn pages_loaded(&self) -> u64 {
        self.pages_loaded
    }

    pub fn last_id(&self) -> Option<EntityId> {
        self.last_id
    }

    /// Loads the next page
    ///
    /// Returns `None` once the cursor reached the `max_id` snapshot or the
    /// source ran dry. A returned page may be empty when every row of it was
    /// filtered or deduplicated away.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or returns ids that do not
    /// strictly increase past the cursor.
    pub async fn load_next_page(
        &mut self,
        run: &mut RunContext,
    ) -> Result<Option<Vec<SourceEntity>>> {
        let Some(max_id) = self.max_id else {
            return Ok(None);
        };
        if self.last_id.is_some_and(|last| last >= max_id) {
            return Ok(None);
        }

        let cursor = match self.last_id {
            None => PageCursor::Start { skip: self.offset },
            Some(last) => PageCursor::After(last),
        };
        let rows = self
            .source
            .fetch_page(&self.query, cursor, self.page_size)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        self.advance_cursor(&rows)?;
        run.last_id = self.last_id;
        self.rows_loaded += rows.len() as u64;
        self.pages_loaded += 1;

        tracing::debug!(
            kind = %self.query.kind,
            page = self.pages_loaded,
            rows = rows.len(),
            last_id = ?self.last_id,
            "Loaded page"
        );

        let entities = self.normalize(rows, run).await?;
        Ok(Some(entities))
    }

    fn advance_cursor(&mut self, rows: &[SourceEntity]) -> Result<()> {
        let mut previous = self.last_id;
        for row in rows {
            if previous.is_some_and(|p| row.id <= p) {
                return Err(BatchportError::Source(format!(
                    "Source returned id {} after {}; pages must be ordered by ascending id",
                    row.id,
                    previous.map(|p| p.to_string()).unwrap_or_default()
                )));
            }
            previous = Some(row.id);
        }
        self.last_id = previous;
        Ok(())
    }

    /// Applies kind-specific expansion and filtering, then per-segment dedup
    async fn normalize(
        &self,
        rows: Vec<SourceEntity>,
        run: &mut RunContext,
    ) -> Result<Vec<SourceEntity>> {
        let projection = run.projection();
        let mut entities = rows;

        if self.query.kind == EntityKind::Customer && projection.exclude_system_accounts {
            entities.retain(|e| !e.flag(SYSTEM_ACCOUNT_FLAG));
        }

        let expansion = projection.child_expansion;
        if self.query.kind.supports_child_expansion() && expansion != ChildExpansion::Keep {
            entities = self.expand_children(entities, expansion).await?;
        }

        entities.retain(|e| run.entity_ids_per_segment.insert(e.id));
        Ok(entities)
    }

    async fn expand_children(
        &self,
        parents: Vec<SourceEntity>,
        expansion: ChildExpansion,
    ) -> Result<Vec<SourceEntity>> {
        let parent_ids: Vec<EntityId> = parents
            .iter()
            .filter(|p| p.parent_id.is_none())
            .map(|p| p.id)
            .collect();
        if parent_ids.is_empty() {
            return Ok(parents);
        }

        let mut children: BTreeMap<EntityId, Vec<SourceEntity>> = BTreeMap::new();
        for child in self
            .source
            .fetch_children(self.query.kind, &parent_ids)
            .await?
        {
            if let Some(parent_id) = child.parent_id {
                children.entry(parent_id).or_default().push(child);
            }
        }

        let mut expanded = Vec::with_capacity(parents.len());
        for parent in parents {
            let own = children.remove(&parent.id).unwrap_or_default();
            match expansion {
                ChildExpansion::Replace if !own.is_empty() => expanded.extend(own),
                ChildExpansion::Supplement => {
                    expanded.push(parent);
                    expanded.extend(own);
                }
                _ => expanded.push(parent),
            }
        }
        Ok(expanded)
    }
}
