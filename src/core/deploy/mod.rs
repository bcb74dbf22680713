//! Deployment of produced files
//!
//! After a successful run every enabled deployment target of the profile is
//! published once. Targets fail independently: a failed upload never
//! invalidates the files already on disk.
//!
//! - [`filesystem`] - Copy into a local or mounted folder
//! - [`http`] - PUT each file to a base URL
//! - [`notify`] - Completion webhook

pub mod filesystem;
pub mod http;
pub mod notify;

pub use filesystem::FileSystemPublisher;
pub use http::HttpPublisher;
pub use notify::{CompletionNotifier, WebhookNotifier};

use crate::core::export::files::ProducedFile;
use crate::domain::ids::ProfileId;
use crate::domain::profile::{DeploymentKind, DeploymentTarget};
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of publishing to one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub name: String,
    pub kind: DeploymentKind,
    pub success: bool,
    pub files_published: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub completed_at: DateTime<Utc>,
}

impl DeploymentResult {
    pub fn succeeded(target: &DeploymentTarget, files_published: usize) -> Self {
        Self {
            name: target.name.clone(),
            kind: target.kind,
            success: true,
            files_published,
            message: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(target: &DeploymentTarget, message: impl Into<String>) -> Self {
        Self {
            name: target.name.clone(),
            kind: target.kind,
            success: false,
            files_published: 0,
            message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }
}

/// What a publisher gets to deliver
#[derive(Debug, Clone, Copy)]
pub struct DeploymentContext<'a> {
    pub profile_id: &'a ProfileId,
    pub export_dir: &'a Path,
    pub files: &'a [ProducedFile],
    pub zip: Option<&'a ProducedFile>,
}

impl<'a> DeploymentContext<'a> {
    /// Files a target receives: the archive for `zip_only`, the data files otherwise
    pub fn files_for(&self, target: &DeploymentTarget) -> Vec<&'a ProducedFile> {
        if target.zip_only {
            self.zip.into_iter().collect()
        } else {
            self.files.iter().collect()
        }
    }
}

/// Delivery of produced files to one kind of target
#[async_trait]
pub trait DeploymentPublisher: Send + Sync {
    fn kind(&self) -> DeploymentKind;

    /// Publishes the files of a run; returns the number of files delivered
    ///
    /// # Errors
    ///
    /// Returns an error if any file could not be delivered.
    async fn publish(&self, target: &DeploymentTarget, ctx: &DeploymentContext<'_>)
        -> Result<usize>;
}

/// Publishers keyed by deployment kind
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<DeploymentKind, Arc<dyn DeploymentPublisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the file system and HTTP publishers
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults(http_timeout: Duration) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(FileSystemPublisher::new()));
        registry.register(Arc::new(HttpPublisher::new(http_timeout)?));
        Ok(registry)
    }

    pub fn register(&mut self, publisher: Arc<dyn DeploymentPublisher>) {
        self.publishers.insert(publisher.kind(), publisher);
    }

    pub fn get(&self, kind: DeploymentKind) -> Option<Arc<dyn DeploymentPublisher>> {
        self.publishers.get(&kind).cloned()
    }

    /// Publishes to one target, folding any error into the result
    pub async fn deploy(&self, target: &DeploymentTarget, ctx: &DeploymentContext<'_>) -> DeploymentResult {
        let Some(publisher) = self.get(target.kind) else {
            return DeploymentResult::failed(
                target,
                format!("No publisher registered for '{}' targets", target.kind),
            );
        };

        match publisher.publish(target, ctx).await {
            Ok(count) => {
                tracing::info!(
                    deployment = %target.name,
                    kind = %target.kind,
                    files = count,
                    "Deployment succeeded"
                );
                DeploymentResult::succeeded(target, count)
            }
            Err(e) => {
                tracing::warn!(deployment = %target.name, error = %e, "Deployment failed");
                DeploymentResult::failed(target, e.to_string())
            }
        }
    }
}

/// Builds the HTTP client shared by publishers and notifiers
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BatchportError::Configuration(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn target(kind: DeploymentKind, zip_only: bool) -> DeploymentTarget {
        DeploymentTarget {
            name: "t".to_string(),
            kind,
            enabled: true,
            path: Some("/tmp/out".to_string()),
            url: None,
            username: None,
            password: None,
            zip_only,
        }
    }

    fn file(name: &str) -> ProducedFile {
        ProducedFile {
            file_name: name.to_string(),
            path: PathBuf::from(name),
            store_id: Default::default(),
            segment: 1,
            records: 1,
            size_bytes: 1,
            sha256: String::new(),
            related_to: None,
        }
    }

    #[test]
    fn test_files_for_target() {
        let profile_id = ProfileId::new("p").unwrap();
        let files = vec![file("a.csv"), file("b.csv")];
        let zip = file("p.zip");
        let ctx = DeploymentContext {
            profile_id: &profile_id,
            export_dir: Path::new("/tmp"),
            files: &files,
            zip: Some(&zip),
        };

        assert_eq!(ctx.files_for(&target(DeploymentKind::FileSystem, false)).len(), 2);
        let only_zip = ctx.files_for(&target(DeploymentKind::FileSystem, true));
        assert_eq!(only_zip.len(), 1);
        assert_eq!(only_zip[0].file_name, "p.zip");
    }

    #[tokio::test]
    async fn test_missing_publisher_is_a_failed_result() {
        let registry = PublisherRegistry::new();
        let profile_id = ProfileId::new("p").unwrap();
        let ctx = DeploymentContext {
            profile_id: &profile_id,
            export_dir: Path::new("/tmp"),
            files: &[],
            zip: None,
        };

        let result = registry.deploy(&target(DeploymentKind::Http, false), &ctx).await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("No publisher"));
    }
}
