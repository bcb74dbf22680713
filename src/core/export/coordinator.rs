//! Export coordinator - main orchestrator of a run
//!
//! A run moves through `Init → (per store) Segment Loop → Deploy → Notify →
//! Post-process → Finalize`. Finalize runs on every exit path, including a
//! panic escaping the pipeline.

use crate::adapters::profiles::{FileProfileStore, ProfileStore};
use crate::adapters::providers::ProviderRegistry;
use crate::adapters::source::{EntitySource, SourceQuery};
use crate::config::{BatchportConfig, ExportConfig};
use crate::core::deploy::notify::{CompletionNotifier, WebhookNotifier};
use crate::core::deploy::{DeploymentContext, PublisherRegistry};
use crate::core::export::context::{RunContext, StoreMeta};
use crate::core::export::convert::{FlatRecordConverter, RecordConverter};
use crate::core::export::execute::{ExecuteContext, OutputProvider, RelatedData};
use crate::core::export::files::{
    create_zip, export_dir, prepare_export_dir, remove_files, segment_base_name, ProducedFile,
};
use crate::core::export::loader::CursorLoader;
use crate::core::export::lock::ProfileLocks;
use crate::core::export::preload::{BatchPreloader, SourcePreloader};
use crate::core::export::segmenter::Segmenter;
use crate::core::export::stream::{OutputStream, StreamOutput};
use crate::core::export::summary::{ExportError, ExportErrorType, RunSummary};
use crate::core::state::{RunRecord, RunStatus, StateManager};
use crate::domain::entity::{EntityKind, Store};
use crate::domain::ids::{EntityId, ProfileId, StoreId};
use crate::domain::profile::ExportProfile;
use crate::domain::{BatchportError, Result};
use crate::{log_error_with_context, log_run_complete, log_run_start, log_segment_progress};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Engine-wide export settings
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Profile folders are created below this directory
    pub output_root: PathBuf,
    pub page_size: usize,
    pub flush_threshold_bytes: usize,
    pub max_record_failures: u32,
    pub http_timeout: Duration,
}

impl ExportSettings {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            output_root: PathBuf::from(&config.output_dir),
            page_size: config.page_size,
            flush_threshold_bytes: config.flush_threshold_bytes,
            max_record_failures: config.max_record_failures,
            http_timeout: Duration::from_secs(config.http_timeout_seconds),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// What a caller asks the coordinator to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub profile_id: ProfileId,

    /// Overrides the profile's id subset when non-empty
    pub entity_ids: Vec<EntityId>,

    /// Tag naming who triggered the run
    pub origin: String,

    pub preview: bool,
}

impl RunRequest {
    pub fn new(profile_id: ProfileId) -> Self {
        Self {
            profile_id,
            entity_ids: Vec::new(),
            origin: "manual".to_string(),
            preview: false,
        }
    }

    pub fn with_entity_ids(mut self, entity_ids: Vec<EntityId>) -> Self {
        self.entity_ids = entity_ids;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn preview(mut self) -> Self {
        self.preview = true;
        self
    }
}

/// Export coordinator
pub struct ExportCoordinator {
    settings: ExportSettings,
    source: Arc<dyn EntitySource>,
    state_manager: StateManager,
    providers: ProviderRegistry,
    converter: Arc<dyn RecordConverter>,
    preloader: Arc<dyn BatchPreloader>,
    publishers: PublisherRegistry,
    notifier: Arc<dyn CompletionNotifier>,
    locks: ProfileLocks,
}

impl ExportCoordinator {
    /// Creates a coordinator with the built-in providers, converter,
    /// publishers and webhook notifier
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        settings: ExportSettings,
        source: Arc<dyn EntitySource>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self> {
        let publishers = PublisherRegistry::with_defaults(settings.http_timeout)?;
        let notifier = Arc::new(WebhookNotifier::new(settings.http_timeout)?);

        Ok(Self {
            preloader: Arc::new(SourcePreloader::new(source.clone())),
            settings,
            source,
            state_manager: StateManager::new_with_store(profiles),
            providers: ProviderRegistry::with_defaults(),
            converter: Arc::new(FlatRecordConverter::new()),
            publishers,
            notifier,
            locks: ProfileLocks::global(),
        })
    }

    /// Creates a coordinator whose profiles and run records come from configuration
    pub fn from_config(config: &BatchportConfig, source: Arc<dyn EntitySource>) -> Result<Self> {
        Self::new(
            ExportSettings::from_config(&config.export),
            source,
            Arc::new(FileProfileStore::from_config(config)),
        )
    }

    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn RecordConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_preloader(mut self, preloader: Arc<dyn BatchPreloader>) -> Self {
        self.preloader = preloader;
        self
    }

    pub fn with_publishers(mut self, publishers: PublisherRegistry) -> Self {
        self.publishers = publishers;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_locks(mut self, locks: ProfileLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Executes one run of a profile
    ///
    /// # Errors
    ///
    /// Fails before any work when the profile is locked by another run
    /// ([`BatchportError::LockContention`]), unknown, invalid, disabled, or
    /// names an unknown provider. A cancelled run is finalized and then
    /// reported as [`BatchportError::Cancelled`]. Every other failure is
    /// recorded in the returned summary.
    pub async fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let _lock = self.locks.try_acquire(request.profile_id.as_str())?;

        let profile = self.state_manager.load_profile(&request.profile_id).await?;
        profile.validate().map_err(BatchportError::Validation)?;
        if !profile.enabled && !request.preview {
            return Err(BatchportError::Validation(format!(
                "Export profile '{}' is disabled",
                profile.id
            )));
        }
        let provider = self.providers.get(&profile.provider)?;

        let started = Instant::now();
        let mut run = RunContext::new(
            profile,
            export_dir(&self.settings.output_root, &request.profile_id),
            self.settings.max_record_failures,
            cancel,
        );
        run.request_entity_ids = request.entity_ids;
        run.origin = request.origin;
        run.preview = request.preview;

        log_run_start!(run.profile.id, run.run_id, provider.system_name());
        run.log.info(format!(
            "Starting run {} of profile '{}' (origin: {}, provider: {}{})",
            run.run_id,
            run.profile.id,
            run.origin,
            provider.system_name(),
            if run.preview { ", preview" } else { "" }
        ));

        let record = if run.preview {
            None
        } else {
            let record = RunRecord::started(run.run_id, run.profile.id.clone(), run.origin.clone());
            if let Err(e) = self.state_manager.mark_started(&record).await {
                run.add_error(
                    ExportErrorType::State,
                    format!("Failed to persist run start: {e}"),
                );
            }
            Some(record)
        };

        let outcome = AssertUnwindSafe(self.run_pipeline(&mut run, provider.as_ref(), started))
            .catch_unwind()
            .await;
        let failed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                log_error_with_context!(&e, "Export run failed");
                run.add_error(error_type_of(&e), e.to_string());
                true
            }
            Err(panic) => {
                run.add_error(
                    ExportErrorType::Unknown,
                    format!("Export run panicked: {}", panic_message(panic.as_ref())),
                );
                true
            }
        };

        let status = if run.is_cancelled() {
            RunStatus::Cancelled
        } else if failed {
            RunStatus::Failed
        } else if run.is_aborted() {
            RunStatus::Aborted
        } else {
            RunStatus::Succeeded
        };

        let summary = self.finalize(&mut run, status, record, started).await;
        if status == RunStatus::Cancelled {
            return Err(BatchportError::Cancelled);
        }
        Ok(summary)
    }

    async fn run_pipeline(
        &self,
        run: &mut RunContext,
        provider: &dyn OutputProvider,
        started: Instant,
    ) -> Result<()> {
        if run.preview {
            run.preview_output = Some(OutputStream::memory(self.settings.flush_threshold_bytes));
        } else {
            prepare_export_dir(&run.export_dir).await?;
        }

        let stores = self.resolve_stores(&run.profile).await?;
        for store in stores {
            if run.check_cancellation() {
                break;
            }
            self.export_store(run, provider, store).await?;
        }

        if run.preview || run.check_cancellation() {
            return Ok(());
        }

        self.create_archive(run).await;
        self.deploy(run).await;
        self.notify(run, started).await;
        self.update_entity_status(run).await;
        self.cleanup(run).await;
        Ok(())
    }

    /// Stores a profile run covers, in export order
    async fn resolve_stores(&self, profile: &ExportProfile) -> Result<Vec<Store>> {
        let known = self.source.stores().await?;

        if let Some(id) = profile.filter.store_id {
            let store = known
                .into_iter()
                .find(|s| s.id == id)
                .unwrap_or_else(|| unknown_store(id));
            return Ok(vec![store]);
        }

        if profile.per_store && !known.is_empty() {
            return Ok(known);
        }
        Ok(vec![Store::default_store()])
    }

    async fn export_store(
        &self,
        run: &mut RunContext,
        provider: &dyn OutputProvider,
        store: Store,
    ) -> Result<()> {
        let store_filter = run.profile.per_store.then_some(store.id);
        let query = SourceQuery::for_profile(&run.profile, &run.request_entity_ids, store_filter);
        let total_records = self.source.count(&query).await?;
        let max_id = self.source.max_id(&query).await?;
        let language = run
            .projection()
            .language
            .clone()
            .unwrap_or_else(|| store.default_language.clone());

        tracing::info!(
            profile_id = %run.profile.id,
            store_id = %store.id,
            total_records,
            max_id = ?max_id,
            language = %language,
            "Exporting store"
        );
        run.log.info(format!(
            "Exporting store '{}' ({total_records} matching rows)",
            store.name
        ));
        run.begin_store(
            store,
            StoreMeta {
                total_records,
                max_id,
                language,
            },
        );

        let loader = CursorLoader::new(
            self.source.clone(),
            query.with_ceiling(max_id),
            self.settings.page_size,
            run.profile.offset,
            total_records,
        );
        let preloader = run
            .projection()
            .needs_associations()
            .then(|| self.preloader.clone());
        let mut segmenter = Segmenter::new(
            loader,
            preloader,
            self.converter.clone(),
            run.profile.limit,
            run.profile.batch_size,
        );

        let mut segment_index = 0u32;
        while !run.check_cancellation() && segmenter.has_data() {
            segment_index += 1;
            segmenter.reset_segment();
            run.begin_segment();
            self.export_segment(run, provider, &mut segmenter, segment_index)
                .await?;
        }

        if !run.is_aborted() {
            let mut related = RelatedData::disabled();
            let outcome = {
                let mut ctx =
                    ExecuteContext::new(&mut segmenter, run, None, &mut related, segment_index);
                AssertUnwindSafe(provider.on_executed(&mut ctx))
                    .catch_unwind()
                    .await
            };
            record_provider_outcome(run, provider, outcome, segment_index);
        }

        run.log.info(format!(
            "Store '{}' done: {} records converted in {segment_index} segment(s)",
            run.store.name,
            segmenter.converted()
        ));
        Ok(())
    }

    /// Hands one segment to the provider and keeps or discards its output
    async fn export_segment(
        &self,
        run: &mut RunContext,
        provider: &dyn OutputProvider,
        segmenter: &mut Segmenter,
        index: u32,
    ) -> Result<()> {
        let threshold = self.settings.flush_threshold_bytes;
        let base_name =
            segment_base_name(&run.profile.file_name_pattern, &run.profile.id, run.store.id, index);
        let extension = provider.file_extension().map(str::to_string);

        let mut output = if run.preview {
            Some(
                run.preview_output
                    .take()
                    .unwrap_or_else(|| OutputStream::memory(threshold)),
            )
        } else if let Some(ext) = &extension {
            let path = run.export_dir.join(format!("{base_name}.{ext}"));
            Some(OutputStream::create(&path, threshold).await?)
        } else {
            None
        };
        let mut related = match &extension {
            Some(ext) if run.preview => RelatedData::memory(ext, threshold),
            Some(ext) => RelatedData::files(run.export_dir.clone(), base_name.clone(), ext, threshold),
            None => RelatedData::disabled(),
        };

        let records_before = output.as_ref().map_or(0, OutputStream::records);
        let marker = segmenter.progress_marker();
        let outcome = {
            let mut ctx = ExecuteContext::new(segmenter, run, output.as_mut(), &mut related, index);
            AssertUnwindSafe(provider.execute(&mut ctx))
                .catch_unwind()
                .await
        };
        record_provider_outcome(run, provider, outcome, index);

        if !run.is_aborted() && segmenter.progress_marker() == marker && segmenter.has_data() {
            let message = format!(
                "Provider '{}' returned without consuming segment {index}",
                provider.system_name()
            );
            run.abort_hard(message.clone());
            run.errors
                .push(ExportError::new(ExportErrorType::Provider, message));
        }

        if run.is_aborted() {
            if let Some(stream) = output {
                stream.discard().await?;
            }
            related.discard_all().await?;
            tracing::warn!(
                profile_id = %run.profile.id,
                store_id = %run.store.id,
                segment = index,
                "Discarded output of aborted segment"
            );
            return Ok(());
        }

        let store_id = run.store.id;
        if run.preview {
            // The preview stream spans segments; count only segments that added records
            if output.as_ref().is_some_and(|s| s.records() > records_before) {
                run.segments_written += 1;
            }
            run.preview_output = output;
            for (unit, out) in related.finish_all().await? {
                tracing::debug!(unit = %unit, records = out.records, "Preview related data");
            }
            return Ok(());
        }

        if let Some(stream) = output {
            if stream.records() == 0 {
                stream.discard().await?;
            } else {
                let file = produced_file(stream.finish().await?, store_id, index, None)?;
                run.log.info(format!(
                    "Wrote {} ({} records, {} bytes)",
                    file.file_name, file.records, file.size_bytes
                ));
                run.produced_files.push(file);
                run.segments_written += 1;
            }
        }
        for (unit, out) in related.finish_all().await? {
            let file = produced_file(out, store_id, index, Some(unit))?;
            run.produced_files.push(file);
        }

        log_segment_progress!(
            store_id,
            index,
            segmenter.converted(),
            segmenter.total_records()
        );
        Ok(())
    }

    async fn create_archive(&self, run: &mut RunContext) {
        if !run.profile.create_zip || run.produced_files.is_empty() {
            return;
        }
        match create_zip(&run.export_dir, &run.profile.id, &run.produced_files).await {
            Ok(zip) => {
                run.log.info(format!("Created archive {}", zip.file_name));
                run.zip = Some(zip);
            }
            Err(e) => run.add_error(
                ExportErrorType::Files,
                format!("Failed to create zip archive: {e}"),
            ),
        }
    }

    /// Publishes to every enabled target; one failing target never stops the others
    async fn deploy(&self, run: &mut RunContext) {
        for index in 0..run.profile.deployments.len() {
            if run.check_cancellation() {
                return;
            }

            let result = {
                let target = &run.profile.deployments[index];
                if !target.enabled {
                    continue;
                }
                let ctx = DeploymentContext {
                    profile_id: &run.profile.id,
                    export_dir: &run.export_dir,
                    files: &run.produced_files,
                    zip: run.zip.as_ref(),
                };
                self.publishers.deploy(target, &ctx).await
            };

            if result.success {
                run.log.info(format!(
                    "Deployment '{}' published {} file(s)",
                    result.name, result.files_published
                ));
            } else {
                run.add_error(
                    ExportErrorType::Deployment,
                    format!(
                        "Deployment '{}' failed: {}",
                        result.name,
                        result.message.as_deref().unwrap_or("unknown error")
                    ),
                );
            }
            run.deployments.push(result);
        }
    }

    async fn notify(&self, run: &mut RunContext, started: Instant) {
        let Some(target) = run.profile.notify.clone() else {
            return;
        };

        let snapshot = RunSummary::from_run(run, RunStatus::Succeeded, started.elapsed());
        if target.only_on_failure && snapshot.is_clean() {
            tracing::debug!(profile_id = %run.profile.id, "Run is clean, notification skipped");
            return;
        }

        match self.notifier.notify(&target, &snapshot).await {
            Ok(()) => {
                run.notification_sent = true;
                run.log.info(format!("Sent completion notification to {}", target.url));
            }
            Err(e) => run.add_error(
                ExportErrorType::Notification,
                format!("Failed to send completion notification: {e}"),
            ),
        }
    }

    /// Writes the configured status to every exported order in one call
    async fn update_entity_status(&self, run: &mut RunContext) {
        if run.profile.entity_kind != EntityKind::Order || run.entity_ids_loaded.is_empty() {
            return;
        }
        let Some(status) = run.projection().order_status_after_export.clone() else {
            return;
        };

        let ids: Vec<EntityId> = run.entity_ids_loaded.iter().copied().collect();
        match self
            .source
            .mark_exported(EntityKind::Order, &ids, &status)
            .await
        {
            Ok(updated) => {
                run.entities_marked = updated;
                run.log
                    .info(format!("Set status '{status}' on {updated} order(s)"));
            }
            Err(e) => run.add_error(
                ExportErrorType::StatusUpdate,
                format!("Failed to update order status: {e}"),
            ),
        }
    }

    /// Removes the produced files once every deployment succeeded
    async fn cleanup(&self, run: &mut RunContext) {
        if !run.profile.cleanup_after_deploy
            || run.deployments.is_empty()
            || run.deployments.iter().any(|d| !d.success)
        {
            return;
        }

        match remove_files(run.produced_files.iter().chain(run.zip.iter())).await {
            Ok(removed) => {
                run.files_cleaned_up = true;
                run.log
                    .info(format!("Removed {removed} file(s) after deployment"));
            }
            Err(e) => run.add_error(
                ExportErrorType::Files,
                format!("Failed to clean up export files: {e}"),
            ),
        }
    }

    /// Persists the outcome and releases the run's memory
    async fn finalize(
        &self,
        run: &mut RunContext,
        status: RunStatus,
        record: Option<RunRecord>,
        started: Instant,
    ) -> RunSummary {
        let mut preview_output = None;
        if let Some(stream) = run.preview_output.take() {
            match stream.finish().await {
                Ok(output) => preview_output = output.contents,
                Err(e) => run.add_error(
                    ExportErrorType::Files,
                    format!("Failed to finish preview output: {e}"),
                ),
            }
        }

        let mut summary = RunSummary::from_run(run, status, started.elapsed());
        summary.preview_output = preview_output;

        if let Some(mut record) = record {
            if let Err(e) = self.state_manager.mark_finished(&mut record, &summary).await {
                log_error_with_context!(&e, "Failed to persist run record");
                summary.errors.push(ExportError::new(
                    ExportErrorType::State,
                    format!("Failed to persist run record: {e}"),
                ));
            }

            run.log.info(format!(
                "Run finished with status {status}: {} records exported, {} failed, {} file(s)",
                summary.records_succeeded,
                summary.records_failed,
                summary.files.len()
            ));
            if let Err(e) = run.log.write_to(&run.export_dir).await {
                tracing::warn!(
                    profile_id = %run.profile.id,
                    error = %e,
                    "Failed to write run log"
                );
            }
        }

        run.teardown();
        log_run_complete!(
            summary.profile_id,
            summary.records_succeeded,
            summary.files.len(),
            summary.duration
        );
        summary.log_summary();
        summary
    }
}

/// Turns a provider failure or panic into a hard abort
fn record_provider_outcome(
    run: &mut RunContext,
    provider: &dyn OutputProvider,
    outcome: std::thread::Result<Result<()>>,
    segment: u32,
) {
    let (error_type, message) = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => {
            if e.is_resource_exhaustion() {
                tracing::error!(
                    profile_id = %run.profile.id,
                    error = %e,
                    "Resources exhausted while exporting; reduce the profile's batch_size or the export page_size"
                );
                run.log.error(
                    "Resources exhausted; reduce the profile's batch_size (records per segment)",
                );
            }
            (error_type_of(&e), e.to_string())
        }
        Err(panic) => (
            ExportErrorType::Provider,
            format!(
                "Provider '{}' panicked: {}",
                provider.system_name(),
                panic_message(panic.as_ref())
            ),
        ),
    };

    run.abort_hard(message.clone());
    let context = format!("store_id={}, segment={segment}", run.store.id);
    run.errors
        .push(ExportError::new(error_type, message).with_context(context));
}

fn error_type_of(error: &BatchportError) -> ExportErrorType {
    match error {
        BatchportError::Source(_) => ExportErrorType::Source,
        BatchportError::Provider(_) | BatchportError::Serialization(_) => ExportErrorType::Provider,
        BatchportError::ResourceExhausted(_) => ExportErrorType::ResourceExhausted,
        BatchportError::Io(_) => ExportErrorType::Files,
        BatchportError::Deployment(_) => ExportErrorType::Deployment,
        BatchportError::Notification(_) => ExportErrorType::Notification,
        BatchportError::State(_) => ExportErrorType::State,
        BatchportError::Cancelled => ExportErrorType::Cancelled,
        _ => ExportErrorType::Unknown,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn unknown_store(id: StoreId) -> Store {
    Store {
        id,
        name: format!("store-{id}"),
        ..Store::default_store()
    }
}

fn produced_file(
    output: StreamOutput,
    store_id: StoreId,
    segment: u32,
    related_to: Option<String>,
) -> Result<ProducedFile> {
    let path = output
        .path
        .ok_or_else(|| BatchportError::Export("Segment output has no file".to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ProducedFile {
        file_name,
        path,
        store_id,
        segment,
        records: output.records,
        size_bytes: output.size_bytes,
        sha256: output.sha256,
        related_to,
    })
}
