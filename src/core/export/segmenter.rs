//! Segmenter
//!
//! Decouples three granularities: the database page size used by the
//! [`CursorLoader`], the number of records per segment handed to an output
//! provider, and the global record limit of a run.
//!
//! Loaded entities wait in a FIFO queue until a provider asks for the current
//! segment. Conversion happens at dequeue time, one whole entity at a time, so
//! a segment may exceed its bound by the output of one entity minus one.

use crate::core::export::context::RunContext;
use crate::core::export::convert::{ConvertContext, RecordConverter};
use crate::core::export::loader::CursorLoader;
use crate::core::export::preload::BatchPreloader;
use crate::domain::entity::SourceEntity;
use crate::domain::errors::RecordFailure;
use crate::domain::record::ExportRecord;
use crate::domain::Result;
use std::collections::VecDeque;
use std::sync::Arc;

/// Buffers entities and cuts converted records into segments
pub struct Segmenter {
    loader: CursorLoader,
    preloader: Option<Arc<dyn BatchPreloader>>,
    converter: Arc<dyn RecordConverter>,
    queue: VecDeque<SourceEntity>,

    /// 0 = unlimited
    limit: u64,
    /// 0 = one segment for the whole store
    records_per_segment: u64,
    total_records: u64,

    converted: u64,
    segment_converted: u64,
    entities_dequeued: u64,
    end_of_data: bool,
}

impl Segmenter {
    pub fn new(
        loader: CursorLoader,
        preloader: Option<Arc<dyn BatchPreloader>>,
        converter: Arc<dyn RecordConverter>,
        limit: u64,
        records_per_segment: u64,
    ) -> Self {
        let available = loader.available_rows();
        let total_records = if limit > 0 {
            available.min(limit)
        } else {
            available
        };

        Self {
            loader,
            preloader,
            converter,
            queue: VecDeque::new(),
            limit,
            records_per_segment,
            total_records,
            converted: 0,
            segment_converted: 0,
            entities_dequeued: 0,
            end_of_data: false,
        }
    }

    /// Expected record count, for progress reporting only
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Records converted so far in the run
    pub fn converted(&self) -> u64 {
        self.converted
    }

    /// Records converted in the current segment
    pub fn segment_converted(&self) -> u64 {
        self.segment_converted
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn loader(&self) -> &CursorLoader {
        &self.loader
    }

    /// Changes whenever the segmenter loads or dequeues anything
    pub fn progress_marker(&self) -> (u64, u64) {
        (self.loader.pages_loaded(), self.entities_dequeued)
    }

    fn limit_reached(&self) -> bool {
        self.limit > 0 && self.converted >= self.limit
    }

    fn segment_full(&self) -> bool {
        self.records_per_segment > 0 && self.segment_converted >= self.records_per_segment
    }

    /// Whether another segment may produce records
    pub fn has_data(&self) -> bool {
        if self.limit_reached() {
            return false;
        }
        if !self.queue.is_empty() {
            return true;
        }
        if self.end_of_data {
            return false;
        }
        self.loader.rows_loaded() < self.loader.available_rows()
    }

    /// Makes entities available for the current segment
    ///
    /// Returns `false` when the limit or the segment bound is reached, or
    /// when the source is exhausted and nothing is left in the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or preloading a page fails.
    pub async fn read_next_segment(&mut self, run: &mut RunContext) -> Result<bool> {
        if self.limit_reached() || self.segment_full() {
            return Ok(false);
        }

        if self.records_per_segment > 0 && self.queue.len() as u64 >= self.records_per_segment {
            return Ok(true);
        }

        if self.end_of_data {
            return Ok(!self.queue.is_empty());
        }

        match self.loader.load_next_page(run).await? {
            None => {
                self.end_of_data = true;
                Ok(!self.queue.is_empty())
            }
            Some(entities) => {
                if let Some(preloader) = &self.preloader {
                    if !entities.is_empty() {
                        let cache = preloader
                            .on_page_loaded(self.loader.kind(), &run.store_meta.language, &entities)
                            .await?;
                        run.replace_batch_cache(cache, self.queue.iter().map(|e| e.id));
                    }
                }
                self.queue.extend(entities);
                Ok(true)
            }
        }
    }

    /// Converts queued entities until a bound is reached or the queue is empty
    ///
    /// A failed conversion is counted on the run and the entity is skipped.
    /// Conversion stops as soon as the run is aborted.
    pub fn current_segment(&mut self, run: &mut RunContext) -> Vec<ExportRecord> {
        let mut records = Vec::new();

        loop {
            if run.is_aborted() || self.limit_reached() || self.segment_full() {
                break;
            }
            let Some(entity) = self.queue.pop_front() else {
                break;
            };
            self.entities_dequeued += 1;

            let result = {
                let ctx = ConvertContext {
                    store: &run.store,
                    language: &run.store_meta.language,
                    projection: &run.profile.projection,
                    cache: &run.batch_cache,
                };
                self.converter.convert(&entity, &ctx)
            };

            match result {
                Ok(mut output) => {
                    let mut truncated = false;
                    if self.limit > 0 {
                        let remaining = self.limit - self.converted;
                        if output.len() as u64 > remaining {
                            output.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
                            truncated = true;
                        }
                    }
                    let count = output.len() as u64;
                    self.converted += count;
                    self.segment_converted += count;
                    // Cut-off entities are not reported as exported
                    if !truncated {
                        run.entity_ids_loaded.insert(entity.id);
                    }
                    records.extend(output);
                }
                Err(e) => {
                    run.record_failure(
                        RecordFailure::new(format!("Conversion failed: {e}"))
                            .with_entity_id(entity.id.value()),
                    );
                }
            }
        }

        records
    }

    /// Starts a new segment
    pub fn reset_segment(&mut self) {
        self.segment_converted = 0;
    }
}
