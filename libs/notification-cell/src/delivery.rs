// libs/notification-cell/src/delivery.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::error::NotificationError;

/// A rendered message ready for a sink.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

impl Notification {
    pub fn text(recipient: Option<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { recipient, subject: subject.into(), body: body.into(), html: false }
    }

    pub fn html(recipient: Option<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { recipient, subject: subject.into(), body: body.into(), html: true }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the tracing output.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            recipient = notification.recipient.as_deref().unwrap_or("-"),
            "{}",
            notification.subject
        );
        debug!("{}", notification.body);
        Ok(())
    }
}

/// Posts `{"text": ...}` to a chat webhook.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        let text = match &notification.recipient {
            Some(recipient) => format!("{} ({})\n\n{}", notification.subject, recipient, notification.body),
            None => format!("{}\n\n{}", notification.subject, notification.body),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Webhook error ({}): {}", status, error_text);
            return Err(NotificationError::Delivery(format!("webhook returned {}", status)));
        }

        debug!("Webhook accepted '{}'", notification.subject);
        Ok(())
    }
}

pub fn sink_from_config(config: &AppConfig) -> Arc<dyn NotificationSink> {
    match &config.notification_webhook_url {
        Some(url) => {
            info!("Notifications will be posted to the configured webhook");
            Arc::new(WebhookSink::new(url.clone()))
        }
        None => Arc::new(LogSink),
    }
}
