//! Run context
//!
//! One [`RunContext`] exists per run. It is owned by the coordinator and
//! passed by reference through every pipeline stage; the profile lock
//! guarantees that no two runs of a profile share state.

use crate::core::deploy::DeploymentResult;
use crate::core::export::files::ProducedFile;
use crate::core::export::preload::BatchCache;
use crate::core::export::stream::OutputStream;
use crate::core::export::summary::{ExportError, ExportErrorType};
use crate::domain::entity::Store;
use crate::domain::errors::RecordFailure;
use crate::domain::ids::EntityId;
use crate::domain::profile::{ExportProfile, ExportProjection};
use crate::logging::RunLog;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Abort state of a run
///
/// Only two states exist: a run either continues or stops for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortState {
    #[default]
    None,
    /// Stop immediately and discard the segment in progress
    Hard,
}

/// Snapshot taken when a store starts exporting
#[derive(Debug, Clone, Default)]
pub struct StoreMeta {
    /// Matching source rows at store start
    pub total_records: u64,

    /// Highest matching id at store start; pages never go above it
    pub max_id: Option<EntityId>,

    /// Language records are converted in
    pub language: String,
}

/// Counters and failure state of a run
#[derive(Debug, Clone, Default)]
pub struct RunTally {
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub abort: AbortState,
    pub last_error: Option<String>,
}

/// Mutable state of one run
pub struct RunContext {
    pub run_id: Uuid,

    /// Profile snapshot taken at run start
    pub profile: ExportProfile,

    /// Explicit id subset requested by the caller
    pub request_entity_ids: Vec<EntityId>,

    /// Free-form tag naming who triggered the run
    pub origin: String,

    /// Preview runs write to memory and skip post-processing
    pub preview: bool,

    pub store: Store,
    pub store_meta: StoreMeta,

    /// Keyset cursor: last id returned by the source
    pub last_id: Option<EntityId>,

    /// Entities emitted in the current segment; cleared every segment
    pub entity_ids_per_segment: HashSet<EntityId>,

    /// Every entity converted during the run, for the post-run bulk update
    pub entity_ids_loaded: BTreeSet<EntityId>,

    /// Associated data of the current page
    pub batch_cache: BatchCache,

    pub tally: RunTally,
    pub max_record_failures: u32,

    pub export_dir: PathBuf,
    pub produced_files: Vec<ProducedFile>,
    pub zip: Option<ProducedFile>,
    pub deployments: Vec<DeploymentResult>,
    pub entities_marked: u64,
    pub notification_sent: bool,
    pub files_cleaned_up: bool,
    pub segments_written: u32,

    /// Accumulated output of a preview run
    pub preview_output: Option<OutputStream>,

    pub errors: Vec<ExportError>,
    pub log: RunLog,

    cancel: CancellationToken,
    cancelled: bool,
}

impl RunContext {
    /// Creates the context of a new run
    pub fn new(
        profile: ExportProfile,
        export_dir: PathBuf,
        max_record_failures: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile,
            request_entity_ids: Vec::new(),
            origin: String::new(),
            preview: false,
            store: Store::default_store(),
            store_meta: StoreMeta::default(),
            last_id: None,
            entity_ids_per_segment: HashSet::new(),
            entity_ids_loaded: BTreeSet::new(),
            batch_cache: BatchCache::new(),
            tally: RunTally::default(),
            max_record_failures,
            export_dir,
            produced_files: Vec::new(),
            zip: None,
            deployments: Vec::new(),
            entities_marked: 0,
            notification_sent: false,
            files_cleaned_up: false,
            segments_written: 0,
            preview_output: None,
            errors: Vec::new(),
            log: RunLog::new(),
            cancel,
            cancelled: false,
        }
    }

    pub fn projection(&self) -> &ExportProjection {
        &self.profile.projection
    }

    /// Switches the run to a new store and resets the cursor
    pub fn begin_store(&mut self, store: Store, meta: StoreMeta) {
        self.store = store;
        self.store_meta = meta;
        self.last_id = None;
        self.entity_ids_per_segment.clear();
        self.batch_cache.clear();
    }

    /// Clears per-segment state
    pub fn begin_segment(&mut self) {
        self.entity_ids_per_segment.clear();
    }

    pub fn is_aborted(&self) -> bool {
        self.tally.abort == AbortState::Hard
    }

    /// Whether the caller cancelled the run
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Observes the cancellation token; flips the run to `Hard` when set
    ///
    /// Returns whether the run is aborted.
    pub fn check_cancellation(&mut self) -> bool {
        if !self.cancelled && self.cancel.is_cancelled() {
            self.cancelled = true;
            self.log.warn("Cancellation requested, aborting run");
            self.abort_hard("Export run was cancelled");
        }
        self.is_aborted()
    }

    /// Stops the run; the first abort reason becomes the last error
    pub fn abort_hard(&mut self, reason: impl Into<String>) {
        if self.tally.abort == AbortState::Hard {
            return;
        }
        let reason = reason.into();
        self.log.error(format!("Run aborted: {reason}"));
        self.tally.abort = AbortState::Hard;
        self.tally.last_error = Some(reason);
    }

    /// Counts a record that could not be exported
    ///
    /// Once more than `max_record_failures` records failed the run is
    /// aborted and the failing record's message becomes the last error.
    pub fn record_failure(&mut self, failure: RecordFailure) {
        self.tally.records_failed += 1;
        match failure.entity_id {
            Some(id) => self
                .log
                .warn(format!("Record {id} failed: {}", failure.message)),
            None => self.log.warn(format!("Record failed: {}", failure.message)),
        }

        if self.tally.records_failed > u64::from(self.max_record_failures) {
            self.abort_hard(failure.message);
        }
    }

    pub fn record_success(&mut self) {
        self.tally.records_succeeded += 1;
    }

    /// Records a run-level error without aborting
    pub fn add_error(&mut self, error_type: ExportErrorType, message: impl Into<String>) {
        let message = message.into();
        self.log.error(message.clone());
        self.tally.last_error = Some(message.clone());
        self.errors.push(ExportError::new(error_type, message));
    }

    /// Replaces the batch cache with the associations of a new page
    ///
    /// Entries of `still_queued` entities survive the replacement.
    pub fn replace_batch_cache(
        &mut self,
        mut fresh: BatchCache,
        still_queued: impl IntoIterator<Item = EntityId>,
    ) {
        for id in still_queued {
            if let Some(entry) = self.batch_cache.remove(&id) {
                fresh.entry(id).or_insert(entry);
            }
        }
        self.batch_cache = fresh;
    }

    /// Releases every cache and tracked entity reference
    pub fn teardown(&mut self) {
        self.batch_cache = BatchCache::new();
        self.entity_ids_per_segment = HashSet::new();
        self.entity_ids_loaded = BTreeSet::new();
        self.preview_output = None;
        self.last_id = None;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Associations, EntityKind};
    use crate::domain::ids::ProfileId;

    fn context(max_failures: u32) -> RunContext {
        let profile = ExportProfile::new(
            ProfileId::new("products").unwrap(),
            EntityKind::Product,
            "csv",
        );
        RunContext::new(
            profile,
            PathBuf::from("/tmp/batchport-test"),
            max_failures,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_twelfth_failure_aborts() {
        let mut run = context(11);
        for i in 1..=11 {
            run.record_failure(RecordFailure::new(format!("failure {i}")));
            assert!(!run.is_aborted());
        }
        assert!(run.tally.last_error.is_none());

        run.record_failure(RecordFailure::new("failure 12").with_entity_id(12));
        assert!(run.is_aborted());
        assert_eq!(run.tally.last_error.as_deref(), Some("failure 12"));
        assert_eq!(run.tally.records_failed, 12);
    }

    #[test]
    fn test_first_abort_reason_wins() {
        let mut run = context(11);
        run.abort_hard("provider failed");
        run.abort_hard("second reason");
        assert_eq!(run.tally.last_error.as_deref(), Some("provider failed"));
    }

    #[test]
    fn test_cancellation_observed_on_check() {
        let mut run = context(11);
        assert!(!run.check_cancellation());

        run.cancellation_token().cancel();
        assert!(!run.is_aborted());
        assert!(run.check_cancellation());
        assert!(run.is_cancelled());
        assert_eq!(run.tally.abort, AbortState::Hard);
    }

    #[test]
    fn test_replace_batch_cache_keeps_queued() {
        let mut run = context(11);
        run.batch_cache.insert(EntityId::new(1), Associations::default());
        run.batch_cache.insert(EntityId::new(2), Associations::default());

        let mut fresh = BatchCache::new();
        fresh.insert(EntityId::new(3), Associations::default());
        run.replace_batch_cache(fresh, [EntityId::new(2)]);

        let mut keys: Vec<_> = run.batch_cache.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![EntityId::new(2), EntityId::new(3)]);
    }

    #[test]
    fn test_teardown_clears_caches() {
        let mut run = context(11);
        run.batch_cache.insert(EntityId::new(1), Associations::default());
        run.entity_ids_loaded.insert(EntityId::new(1));
        run.entity_ids_per_segment.insert(EntityId::new(1));

        run.teardown();
        assert!(run.batch_cache.is_empty());
        assert!(run.entity_ids_loaded.is_empty());
        assert!(run.entity_ids_per_segment.is_empty());
    }
}
