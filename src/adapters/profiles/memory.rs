//! In-process profile store

use super::traits::ProfileStore;
use crate::core::state::RunRecord;
use crate::domain::ids::ProfileId;
use crate::domain::profile::ExportProfile;
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    profiles: BTreeMap<String, ExportProfile>,
    records: BTreeMap<String, RunRecord>,
    /// Every save, in order
    history: Vec<RunRecord>,
}

/// Profile store kept in memory; remembers every saved record
#[derive(Default)]
pub struct MemoryProfileStore {
    inner: Mutex<Inner>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = ExportProfile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.upsert_profile(profile);
        }
        store
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert_profile(&self, profile: ExportProfile) {
        self.inner()
            .profiles
            .insert(profile.id.as_str().to_string(), profile);
    }

    /// Every record saved so far, oldest first
    pub fn history(&self) -> Vec<RunRecord> {
        self.inner().history.clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load_profile(&self, id: &ProfileId) -> Result<ExportProfile> {
        self.inner()
            .profiles
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BatchportError::NotFound(format!("Export profile '{id}'")))
    }

    async fn list_profiles(&self) -> Result<Vec<ExportProfile>> {
        Ok(self.inner().profiles.values().cloned().collect())
    }

    async fn save_run_record(&self, record: &RunRecord) -> Result<()> {
        let mut inner = self.inner();
        inner
            .records
            .insert(record.profile_id.as_str().to_string(), record.clone());
        inner.history.push(record.clone());
        Ok(())
    }

    async fn load_run_record(&self, id: &ProfileId) -> Result<Option<RunRecord>> {
        Ok(self.inner().records.get(id.as_str()).cloned())
    }

    async fn all_run_records(&self) -> Result<Vec<RunRecord>> {
        Ok(self.inner().records.values().cloned().collect())
    }
}
