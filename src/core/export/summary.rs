//! Run summary and reporting
//!
//! This module defines the structured result of an export run.

use crate::core::deploy::DeploymentResult;
use crate::core::export::context::RunContext;
use crate::core::export::files::ProducedFile;
use crate::core::state::RunStatus;
use crate::domain::ids::ProfileId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Result of one export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub profile_id: ProfileId,
    pub origin: String,
    pub status: RunStatus,

    /// Whether the run completed without abort or failure
    pub success: bool,
    pub preview: bool,

    /// Records reported as written by the provider
    pub records_succeeded: u64,

    /// Records that failed to convert or write
    pub records_failed: u64,

    /// Segment files written (empty segments are not counted)
    pub segments: u32,

    /// Files left in the export folder
    pub files: Vec<ProducedFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<ProducedFile>,

    pub deployments: Vec<DeploymentResult>,

    /// Rows updated by the post-run status update
    pub entities_marked: u64,

    pub notification_sent: bool,
    pub files_cleaned_up: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub errors: Vec<ExportError>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// Output of a preview run
    #[serde(skip)]
    pub preview_output: Option<Vec<u8>>,
}

impl RunSummary {
    /// Builds the summary from the state of a run
    pub fn from_run(run: &RunContext, status: RunStatus, duration: Duration) -> Self {
        Self {
            run_id: run.run_id,
            profile_id: run.profile.id.clone(),
            origin: run.origin.clone(),
            status,
            success: status == RunStatus::Succeeded,
            preview: run.preview,
            records_succeeded: run.tally.records_succeeded,
            records_failed: run.tally.records_failed,
            segments: run.segments_written,
            files: if run.files_cleaned_up {
                Vec::new()
            } else {
                run.produced_files.clone()
            },
            zip: run.zip.clone(),
            deployments: run.deployments.clone(),
            entities_marked: run.entities_marked,
            notification_sent: run.notification_sent,
            files_cleaned_up: run.files_cleaned_up,
            last_error: run.tally.last_error.clone(),
            errors: run.errors.clone(),
            duration,
            preview_output: None,
        }
    }

    /// Whether the run succeeded without any record failure or error
    pub fn is_clean(&self) -> bool {
        self.success && self.records_failed == 0 && self.last_error.is_none()
    }

    /// Failed deployments
    pub fn failed_deployments(&self) -> impl Iterator<Item = &DeploymentResult> {
        self.deployments.iter().filter(|d| !d.success)
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.records_succeeded + self.records_failed;
        if total == 0 {
            return 100.0;
        }
        (self.records_succeeded as f64 / total as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            profile_id = %self.profile_id,
            run_id = %self.run_id,
            status = %self.status,
            records_succeeded = self.records_succeeded,
            records_failed = self.records_failed,
            segments = self.segments,
            files = self.files.len(),
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export run finished"
        );

        for deployment in self.failed_deployments() {
            tracing::warn!(
                deployment = %deployment.name,
                message = deployment.message.as_deref().unwrap_or_default(),
                "Deployment failed"
            );
        }

        if !self.errors.is_empty() {
            tracing::warn!(error_count = self.errors.len(), "Export run finished with errors");
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = error.context.as_deref().unwrap_or_default(),
                    "Export error"
                );
            }
        }
    }
}

/// Type of export error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportErrorType {
    /// Loading or preloading from the source
    Source,
    /// Output provider failure or panic
    Provider,
    /// Memory or disk exhausted
    ResourceExhausted,
    /// Zip archival or file handling
    Files,
    Deployment,
    Notification,
    /// Post-run status update
    StatusUpdate,
    /// Run record persistence
    State,
    Cancelled,
    Unknown,
}

/// Export error with context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportError {
    pub error_type: ExportErrorType,
    pub message: String,

    /// Optional context (store, segment, deployment name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ExportError {
    pub fn new(error_type: ExportErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
