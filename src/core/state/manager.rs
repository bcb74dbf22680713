//! State manager for profiles and run records
//!
//! This module provides the StateManager used by the coordinator and the CLI
//! to read profiles and to persist run records.

use crate::adapters::profiles::ProfileStore;
use crate::core::export::summary::RunSummary;
use crate::core::state::run_record::RunRecord;
use crate::domain::ids::ProfileId;
use crate::domain::profile::ExportProfile;
use crate::domain::Result;
use std::sync::Arc;

/// State manager for run record persistence
pub struct StateManager {
    /// Profile storage backend
    store: Arc<dyn ProfileStore>,
}

impl StateManager {
    /// Create a new StateManager with a profile store
    ///
    /// # Arguments
    ///
    /// * `store` - Profile store implementation
    pub fn new_with_store(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Load a profile
    ///
    /// # Errors
    ///
    /// Returns an error if the profile does not exist or cannot be read.
    pub async fn load_profile(&self, id: &ProfileId) -> Result<ExportProfile> {
        self.store.load_profile(id).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<ExportProfile>> {
        self.store.list_profiles().await
    }

    /// Persist the record of a run that just started
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn mark_started(&self, record: &RunRecord) -> Result<()> {
        tracing::debug!(
            profile_id = %record.profile_id,
            run_id = %record.run_id,
            "Persisting in-progress run record"
        );
        self.store.save_run_record(record).await
    }

    /// Overwrite the run record with the outcome of the run
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn mark_finished(&self, record: &mut RunRecord, summary: &RunSummary) -> Result<()> {
        record.mark_finished(summary);
        tracing::info!(
            profile_id = %record.profile_id,
            run_id = %record.run_id,
            status = %record.status,
            "Persisting run record"
        );
        self.store.save_run_record(record).await
    }

    /// Latest run record of a profile
    pub async fn load_run_record(&self, id: &ProfileId) -> Result<Option<RunRecord>> {
        self.store.load_run_record(id).await
    }

    /// Latest run record of every profile
    pub async fn all_run_records(&self) -> Result<Vec<RunRecord>> {
        self.store.all_run_records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profiles::MemoryProfileStore;
    use crate::core::export::context::RunContext;
    use crate::core::state::RunStatus;
    use crate::domain::entity::EntityKind;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_started_then_finished() {
        let profile_id = ProfileId::new("orders").unwrap();
        let profile = ExportProfile::new(profile_id.clone(), EntityKind::Order, "csv");
        let store = Arc::new(MemoryProfileStore::with_profiles([profile.clone()]));
        let manager = StateManager::new_with_store(store.clone());

        let mut record = RunRecord::started(Uuid::new_v4(), profile_id.clone(), "cli");
        manager.mark_started(&record).await.unwrap();
        assert!(manager.load_run_record(&profile_id).await.unwrap().unwrap().is_in_progress());

        let run = RunContext::new(profile, PathBuf::from("/tmp"), 11, CancellationToken::new());
        let summary = RunSummary::from_run(&run, RunStatus::Succeeded, Duration::ZERO);
        manager.mark_finished(&mut record, &summary).await.unwrap();

        let loaded = manager.load_run_record(&profile_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Succeeded);
        assert_eq!(store.history().len(), 2);
        assert_eq!(manager.all_run_records().await.unwrap().len(), 1);
    }
}
