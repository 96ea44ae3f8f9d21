//! Job completion notifications.
//!
//! [`HttpWebhookSender`] POSTs a [`NotificationMessage`] as JSON to the
//! endpoint configured for the job's owning account. Accounts without an
//! endpoint are skipped silently.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cdoc_core::{AccountId, JobId, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::NodeConfig;
use crate::error::{ConfigError, JobError};

/// Kind of event being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An asynchronous job finished.
    Job,
}

/// Body of a completion webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub event_type: EventType,
    pub job_id: JobId,
    pub account_id: AccountId,
    pub description: String,
    /// `succeeded`, `failed` or `cancelled`.
    pub status: String,
    pub finished_at: Timestamp,
}

/// Delivers notifications.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Deliver one notification.
    async fn send(&self, message: &NotificationMessage) -> Result<(), JobError>;
}

/// JSON-over-HTTP delivery.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
    endpoints: HashMap<AccountId, Url>,
}

impl HttpWebhookSender {
    /// Sender for the endpoints configured in `config`.
    pub fn from_config(config: &NodeConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.p2p.request_timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "accounts.webhook_url",
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoints: config.webhook_endpoints()?.into_iter().collect(),
        })
    }

    /// Endpoint configured for `account`.
    pub fn endpoint(&self, account: &AccountId) -> Option<&Url> {
        self.endpoints.get(account)
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, message: &NotificationMessage) -> Result<(), JobError> {
        let Some(url) = self.endpoints.get(&message.account_id) else {
            return Ok(());
        };
        let resp = self
            .client
            .post(url.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| JobError::Webhook(format!("{url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(JobError::Webhook(format!("{url} returned {}", resp.status())));
        }
        Ok(())
    }
}

/// Keeps every notification in memory; for tests and embedded hosts that
/// poll instead of receiving callbacks.
#[derive(Debug, Default)]
pub struct MemoryWebhookSender {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl MemoryWebhookSender {
    /// Empty sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl WebhookSender for MemoryWebhookSender {
    async fn send(&self, message: &NotificationMessage) -> Result<(), JobError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
