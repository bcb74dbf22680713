//! HTTP deployment
//!
//! Each file is uploaded with `PUT <url>/<file_name>`, optionally with basic
//! authentication.

use super::{http_client, DeploymentContext, DeploymentPublisher};
use crate::domain::profile::{DeploymentKind, DeploymentTarget};
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Uploads produced files over HTTP
pub struct HttpPublisher {
    client: reqwest::Client,
}

impl HttpPublisher {
    /// Creates a publisher with its own client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeploymentPublisher for HttpPublisher {
    fn kind(&self) -> DeploymentKind {
        DeploymentKind::Http
    }

    async fn publish(
        &self,
        target: &DeploymentTarget,
        ctx: &DeploymentContext<'_>,
    ) -> Result<usize> {
        let base = target.url.as_deref().ok_or_else(|| {
            BatchportError::Deployment(format!("Deployment '{}' has no url", target.name))
        })?;

        let files = ctx.files_for(target);
        for file in &files {
            let url = format!("{}/{}", base.trim_end_matches('/'), file.file_name);
            let body = tokio::fs::read(&file.path).await?;

            tracing::debug!(url = %url, bytes = body.len(), "Uploading file");

            let mut request = self.client.put(&url).body(body);
            if let Some(username) = &target.username {
                let password = target
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().as_str().to_string());
                request = request.basic_auth(username, password);
            }

            let response = request.send().await.map_err(|e| {
                BatchportError::Deployment(format!("Failed to upload {}: {e}", file.file_name))
            })?;

            let status = response.status();
            if !status.is_success() {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(BatchportError::Deployment(format!(
                    "Upload of {} returned status {status}: {error_body}",
                    file.file_name
                )));
            }
        }

        Ok(files.len())
    }
}
