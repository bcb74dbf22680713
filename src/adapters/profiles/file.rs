//! Configuration-backed profile store
//!
//! Profiles come from the `[[profiles]]` tables of the configuration file.
//! Run records are JSON files in `<state_dir>/runs/<profile_id>.json`,
//! written through a temporary file and a rename.

use super::traits::ProfileStore;
use crate::config::BatchportConfig;
use crate::core::state::RunRecord;
use crate::domain::ids::ProfileId;
use crate::domain::profile::ExportProfile;
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Profile store over configuration and a state folder
pub struct FileProfileStore {
    profiles: Vec<ExportProfile>,
    runs_dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(profiles: Vec<ExportProfile>, state_dir: impl AsRef<Path>) -> Self {
        Self {
            profiles,
            runs_dir: state_dir.as_ref().join("runs"),
        }
    }

    pub fn from_config(config: &BatchportConfig) -> Self {
        Self::new(config.profiles.clone(), &config.state.state_dir)
    }

    fn record_path(&self, id: &ProfileId) -> PathBuf {
        self.runs_dir.join(format!("{id}.json"))
    }

    async fn read_record(path: &Path) -> Result<RunRecord> {
        let contents = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            BatchportError::State(format!("Invalid run record {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load_profile(&self, id: &ProfileId) -> Result<ExportProfile> {
        self.profiles
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| BatchportError::NotFound(format!("Export profile '{id}'")))
    }

    async fn list_profiles(&self) -> Result<Vec<ExportProfile>> {
        Ok(self.profiles.clone())
    }

    async fn save_run_record(&self, record: &RunRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.runs_dir).await?;

        let path = self.record_path(&record.profile_id);
        let temp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &path).await?;

        tracing::debug!(
            profile_id = %record.profile_id,
            status = %record.status,
            path = %path.display(),
            "Saved run record"
        );
        Ok(())
    }

    async fn load_run_record(&self, id: &ProfileId) -> Result<Option<RunRecord>> {
        let path = self.record_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read_record(&path).await.map(Some)
    }

    async fn all_run_records(&self) -> Result<Vec<RunRecord>> {
        let mut records = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.runs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping run record"),
            }
        }

        records.sort_by(|a, b| a.profile_id.as_str().cmp(b.profile_id.as_str()));
        Ok(records)
    }
}
