//! Integration tests for paging and segmentation
//!
//! Drives the cursor loader and the segmenter the way the coordinator does,
//! against an in-memory source with call counters.

use batchport::adapters::source::{EntitySource, MemorySource, SourceQuery};
use batchport::core::export::{
    ConvertContext, CursorLoader, FlatRecordConverter, RecordConverter, RunContext, Segmenter,
};
use batchport::domain::{
    BatchportError, EntityId, EntityKind, ExportProfile, ExportRecord, ProfileId, Result,
    SourceEntity,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use test_case::test_case;
use tokio_util::sync::CancellationToken;

/// Converter that rejects every entity
struct FailingConverter;

impl RecordConverter for FailingConverter {
    fn convert(&self, entity: &SourceEntity, _ctx: &ConvertContext<'_>) -> Result<Vec<ExportRecord>> {
        Err(BatchportError::Export(format!("bad entity {}", entity.id)))
    }
}

/// Converter emitting `fan_out` records per entity and remembering every id
struct FanOutConverter {
    fan_out: usize,
    seen: Mutex<Vec<EntityId>>,
}

impl FanOutConverter {
    fn new(fan_out: usize) -> Self {
        Self {
            fan_out,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<EntityId> {
        self.seen.lock().unwrap().clone()
    }
}

impl RecordConverter for FanOutConverter {
    fn convert(&self, entity: &SourceEntity, ctx: &ConvertContext<'_>) -> Result<Vec<ExportRecord>> {
        self.seen.lock().unwrap().push(entity.id);
        Ok((0..self.fan_out)
            .map(|_| ExportRecord::new(entity.id, entity.kind, ctx.store.id, ctx.language))
            .collect())
    }
}

async fn setup(
    source: Arc<MemorySource>,
    converter: Arc<dyn RecordConverter>,
    page_size: usize,
    limit: u64,
    per_segment: u64,
) -> (Segmenter, RunContext) {
    let query = SourceQuery::new(EntityKind::Order);
    let total = source.count(&query).await.unwrap();
    let max_id = source.max_id(&query).await.unwrap();
    let loader = CursorLoader::new(source, query.with_ceiling(max_id), page_size, 0, total);
    let segmenter = Segmenter::new(loader, None, converter, limit, per_segment);

    let profile = ExportProfile::new(ProfileId::new("orders").unwrap(), EntityKind::Order, "jsonl");
    let run = RunContext::new(profile, PathBuf::from("/tmp"), 11, CancellationToken::new());
    (segmenter, run)
}

/// Runs segments to completion; also returns the cursor after every page
async fn drain(
    segmenter: &mut Segmenter,
    run: &mut RunContext,
) -> (Vec<Vec<ExportRecord>>, Vec<EntityId>) {
    let mut segments = Vec::new();
    let mut cursors = Vec::new();

    while segmenter.has_data() && !run.is_aborted() {
        segmenter.reset_segment();
        run.begin_segment();
        let mut segment = Vec::new();

        loop {
            let pages_before = segmenter.loader().pages_loaded();
            if !segmenter.read_next_segment(run).await.unwrap() {
                break;
            }
            if segmenter.loader().pages_loaded() > pages_before {
                cursors.push(segmenter.loader().last_id().unwrap());
            }
            segment.extend(segmenter.current_segment(run));
            if run.is_aborted() {
                break;
            }
        }
        segments.push(segment);
    }

    (segments, cursors)
}

#[tokio::test]
async fn test_single_segment_spans_pages() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 250));
    let (mut segmenter, mut run) =
        setup(source.clone(), Arc::new(FlatRecordConverter::new()), 100, 0, 0).await;

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    assert_eq!(source.page_calls(), 3);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].len(), 250);
    assert_eq!(segmenter.converted(), 250);
}

#[tokio::test]
async fn test_limit_cuts_segments() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 250));
    let (mut segmenter, mut run) =
        setup(source.clone(), Arc::new(FlatRecordConverter::new()), 100, 30, 10).await;
    assert_eq!(segmenter.total_records(), 30);

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    let sizes: Vec<usize> = segments.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 10]);
    assert!(!segmenter.has_data());
    // One page covers the limit
    assert_eq!(source.page_calls(), 1);
}

#[tokio::test]
async fn test_conversion_failures_abort_after_threshold() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 40));
    let (mut segmenter, mut run) = setup(source, Arc::new(FailingConverter), 50, 0, 0).await;

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    assert!(run.is_aborted());
    assert_eq!(run.tally.records_failed, 12);
    assert!(segments.iter().all(Vec::is_empty));

    let last_error = run.tally.last_error.clone().unwrap();
    assert!(last_error.starts_with("Conversion failed"));
    assert!(last_error.contains("bad entity 12"));
}

#[tokio::test]
async fn test_rows_inserted_above_snapshot_are_ignored() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 20));
    let (mut segmenter, mut run) =
        setup(source.clone(), Arc::new(FlatRecordConverter::new()), 5, 0, 0).await;

    // Arrives after the max_id snapshot
    source.insert(SourceEntity::new(EntityId::new(21), EntityKind::Order));
    // Deleted before its page is read
    assert!(source.delete(EntityId::new(17)));

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    let ids: Vec<i64> = segments[0].iter().map(|r| r.entity_id.value()).collect();
    assert_eq!(ids.len(), 19);
    assert!(!ids.contains(&21));
    assert!(!ids.contains(&17));
}

#[tokio::test]
async fn test_source_failure_surfaces() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 30));
    source.fail_pages_after(1);
    let (mut segmenter, mut run) =
        setup(source.clone(), Arc::new(FlatRecordConverter::new()), 10, 0, 0).await;

    assert!(segmenter.read_next_segment(&mut run).await.unwrap());
    assert_eq!(segmenter.current_segment(&mut run).len(), 10);

    let err = segmenter.read_next_segment(&mut run).await.unwrap_err();
    assert!(matches!(err, BatchportError::Source(_)));
    assert_eq!(source.calls().fetch_page.load(Ordering::SeqCst), 2);
}

#[test_case(100, 7, 25, 10 ; "limit below rows")]
#[test_case(40, 10, 55, 0 ; "limit above rows")]
#[test_case(64, 64, 1, 1 ; "limit of one")]
#[test_case(33, 4, 32, 5 ; "page smaller than segment")]
#[tokio::test]
async fn test_limit_is_never_exceeded(rows: i64, page_size: usize, limit: u64, per_segment: u64) {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, rows));
    let (mut segmenter, mut run) =
        setup(source, Arc::new(FanOutConverter::new(3)), page_size, limit, per_segment).await;

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    let written: u64 = segments.iter().map(|s| s.len() as u64).sum();
    assert_eq!(written, limit.min(rows as u64 * 3));
    assert!(segmenter.converted() <= limit);
}

#[test_case(1, 10 ; "one record per entity")]
#[test_case(3, 10 ; "three records per entity")]
#[test_case(4, 3 ; "entity larger than segment")]
#[tokio::test]
async fn test_segment_bound_overflows_by_one_entity_at_most(fan_out: usize, per_segment: u64) {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 50));
    let (mut segmenter, mut run) =
        setup(source, Arc::new(FanOutConverter::new(fan_out)), 8, 0, per_segment).await;

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    let bound = per_segment as usize + fan_out - 1;
    assert!(segments.iter().all(|s| s.len() <= bound));
    // Every segment but the last reaches its bound
    for segment in &segments[..segments.len() - 1] {
        assert!(segment.len() as u64 >= per_segment);
    }
    let written: usize = segments.iter().map(Vec::len).sum();
    assert_eq!(written, 50 * fan_out);
}

#[test_case(45, 0 ; "single page")]
#[test_case(10, 3 ; "many pages small segments")]
#[test_case(7, 20 ; "segments larger than pages")]
#[tokio::test]
async fn test_entities_converted_exactly_once(page_size: usize, per_segment: u64) {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 45));
    let converter = Arc::new(FanOutConverter::new(1));
    let (mut segmenter, mut run) =
        setup(source, converter.clone(), page_size, 0, per_segment).await;

    drain(&mut segmenter, &mut run).await;

    let seen = converter.seen();
    let expected: Vec<EntityId> = (1..=45).map(EntityId::new).collect();
    assert_eq!(seen, expected);
    assert_eq!(run.entity_ids_loaded.len(), 45);
}

#[test_case(3 ; "tiny pages")]
#[test_case(16 ; "medium pages")]
#[test_case(1000 ; "one page")]
#[tokio::test]
async fn test_cursor_strictly_increases(page_size: usize) {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 60));
    let (mut segmenter, mut run) =
        setup(source, Arc::new(FlatRecordConverter::new()), page_size, 0, 7).await;

    let (_, cursors) = drain(&mut segmenter, &mut run).await;

    assert!(!cursors.is_empty());
    assert!(cursors.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(cursors.last().copied(), Some(EntityId::new(60)));
    assert_eq!(run.last_id, Some(EntityId::new(60)));
}

#[tokio::test]
async fn test_entity_cut_by_limit_is_not_reported_loaded() {
    let source = Arc::new(MemorySource::with_sequence(EntityKind::Order, 10));
    let (mut segmenter, mut run) =
        setup(source, Arc::new(FanOutConverter::new(3)), 10, 7, 0).await;

    let (segments, _) = drain(&mut segmenter, &mut run).await;

    assert_eq!(segments[0].len(), 7);
    // Entity 3 only contributed one of its three records
    assert_eq!(segments[0].last().unwrap().entity_id, EntityId::new(3));
    let loaded: Vec<EntityId> = run.entity_ids_loaded.iter().copied().collect();
    assert_eq!(loaded, vec![EntityId::new(1), EntityId::new(2)]);
}
