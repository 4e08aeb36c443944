//! Operator alerts.
//!
//! Delivery is best effort: a notifier logs its own failures and never
//! returns them to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokengrid_types::{GridError, GridResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub command: String,
    pub content: Value,
    pub error: String,
}

impl Alert {
    pub fn new(command: impl Into<String>, content: Value, error: impl ToString) -> Self {
        Self {
            command: command.into(),
            content,
            error: error.to_string(),
        }
    }

    pub fn text(&self) -> String {
        format!(
            "{} failed: {}\ncontent: {}",
            self.command, self.error, self.content
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert);
}

/// Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) {
        tracing::error!(
            command = %alert.command,
            content = %alert.content,
            error = %alert.error,
            "operator alert"
        );
    }
}

/// POSTs `{"text": ...}` to a chat-style webhook.
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> GridResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GridError::Internal(format!("failed to build webhook HTTP client: {e}")))?;
        Ok(Self::with_client(http_client, url))
    }

    pub fn with_client(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) {
        let result = self
            .http_client
            .post(&self.url)
            .json(&json!({ "text": alert.text() }))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::warn!(error = %e, command = %alert.command, "alert delivery failed");
            LogNotifier.notify(alert).await;
        }
    }
}
