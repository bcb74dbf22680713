//! Completion notification

use super::http_client;
use crate::core::export::summary::RunSummary;
use crate::domain::profile::NotificationTarget;
use crate::domain::{BatchportError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Tells someone that a run finished
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, target: &NotificationTarget, summary: &RunSummary) -> Result<()>;
}

/// POSTs the JSON run summary to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, target: &NotificationTarget, summary: &RunSummary) -> Result<()> {
        let response = self
            .client
            .post(&target.url)
            .json(summary)
            .send()
            .await
            .map_err(|e| BatchportError::Notification(format!("Failed to send webhook: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BatchportError::Notification(format!(
                "Webhook returned status {status}"
            )));
        }

        tracing::info!(url = %target.url, status = %status, "Sent completion notification");
        Ok(())
    }
}
