//! File system deployment

use super::{DeploymentContext, DeploymentPublisher};
use crate::domain::profile::{DeploymentKind, DeploymentTarget};
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Copies produced files into the target's `path`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemPublisher;

impl FileSystemPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeploymentPublisher for FileSystemPublisher {
    fn kind(&self) -> DeploymentKind {
        DeploymentKind::FileSystem
    }

    async fn publish(
        &self,
        target: &DeploymentTarget,
        ctx: &DeploymentContext<'_>,
    ) -> Result<usize> {
        let dir = target.path.as_deref().map(PathBuf::from).ok_or_else(|| {
            BatchportError::Deployment(format!("Deployment '{}' has no path", target.name))
        })?;
        tokio::fs::create_dir_all(&dir).await?;

        let files = ctx.files_for(target);
        for file in &files {
            let destination = dir.join(&file.file_name);
            tokio::fs::copy(&file.path, &destination).await.map_err(|e| {
                BatchportError::Deployment(format!(
                    "Failed to copy {} to {}: {e}",
                    file.path.display(),
                    destination.display()
                ))
            })?;
        }
        Ok(files.len())
    }
}
