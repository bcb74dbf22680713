//! Persisted run records
//!
//! One record per profile describes the latest run. It is saved as
//! `in_progress` when a run starts and overwritten during finalization, so a
//! record still marked `in_progress` points at a run that died without
//! finalizing.

use crate::core::deploy::DeploymentResult;
use crate::core::export::files::ProducedFile;
use crate::core::export::summary::RunSummary;
use crate::domain::ids::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Run status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress
    #[default]
    InProgress,
    /// Run completed; deployments may still have failed
    Succeeded,
    /// Run stopped on an error
    Failed,
    /// Run was hard-aborted (failure threshold or provider failure)
    Aborted,
    /// Caller cancelled the run
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Latest run of a profile
///
/// # Examples
///
/// ```
/// use batchport::core::state::{RunRecord, RunStatus};
/// use batchport::domain::ProfileId;
/// use uuid::Uuid;
///
/// let record = RunRecord::started(Uuid::new_v4(), ProfileId::new("orders").unwrap(), "scheduler");
/// assert!(record.is_in_progress());
/// assert_eq!(record.status, RunStatus::InProgress);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub profile_id: ProfileId,

    #[serde(default)]
    pub origin: String,

    pub status: RunStatus,
    pub started_at: DateTime<Utc>,

    /// `None` while the run is in progress
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub records_succeeded: u64,

    #[serde(default)]
    pub records_failed: u64,

    #[serde(default)]
    pub files: Vec<ProducedFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<ProducedFile>,

    #[serde(default)]
    pub deployments: Vec<DeploymentResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RunRecord {
    /// Record of a run that just started
    pub fn started(run_id: Uuid, profile_id: ProfileId, origin: impl Into<String>) -> Self {
        Self {
            run_id,
            profile_id,
            origin: origin.into(),
            status: RunStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            records_succeeded: 0,
            records_failed: 0,
            files: Vec::new(),
            zip: None,
            deployments: Vec::new(),
            last_error: None,
        }
    }

    /// Copies the outcome of a finished run into the record
    pub fn mark_finished(&mut self, summary: &RunSummary) {
        self.status = summary.status;
        self.completed_at = Some(Utc::now());
        self.records_succeeded = summary.records_succeeded;
        self.records_failed = summary.records_failed;
        self.files = summary.files.clone();
        self.zip = summary.zip.clone();
        self.deployments = summary.deployments.clone();
        self.last_error = summary.last_error.clone();
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == RunStatus::InProgress
    }

    /// Wall time of the run, once completed
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|completed| completed - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::context::RunContext;
    use crate::domain::entity::EntityKind;
    use crate::domain::profile::ExportProfile;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&RunStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_mark_finished() {
        let profile_id = ProfileId::new("orders").unwrap();
        let mut record = RunRecord::started(Uuid::new_v4(), profile_id.clone(), "cli");
        assert!(record.duration().is_none());

        let profile = ExportProfile::new(profile_id, EntityKind::Order, "csv");
        let mut run = RunContext::new(profile, PathBuf::from("/tmp"), 11, CancellationToken::new());
        run.tally.records_succeeded = 10;
        run.abort_hard("threshold exceeded");
        let summary = RunSummary::from_run(&run, RunStatus::Aborted, Duration::from_secs(1));

        record.mark_finished(&summary);
        assert_eq!(record.status, RunStatus::Aborted);
        assert_eq!(record.records_succeeded, 10);
        assert_eq!(record.last_error.as_deref(), Some("threshold exceeded"));
        assert!(record.duration().is_some());
    }

    #[test]
    fn test_record_round_trip() {
        let record = RunRecord::started(Uuid::new_v4(), ProfileId::new("orders").unwrap(), "cli");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: RunRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.run_id, record.run_id);
        assert_eq!(parsed.status, RunStatus::InProgress);
    }
}
