//! Outbound delivery — fire-and-forget message sending.
//!
//! Failures are logged, never retried, and never affect status-store
//! correctness: a user whose webhook is down still gets their busy
//! record cleared on time.

use async_trait::async_trait;
use std::sync::Arc;

use wf_domain::config::{DeliveryConfig, DeliveryMode};
use wf_domain::{Error, Result};

/// The delivery collaborator. `send` is fire-and-forget by contract —
/// implementations swallow and log their own failures.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, user_id: &str, text: &str);
}

/// Build the configured sender.
pub fn create_sender(cfg: &DeliveryConfig) -> Result<Arc<dyn MessageSender>> {
    match cfg.mode {
        DeliveryMode::Log => Ok(Arc::new(LogSender)),
        DeliveryMode::Console => Ok(Arc::new(ConsoleSender)),
        DeliveryMode::Webhook => {
            let url = cfg
                .webhook_url
                .clone()
                .ok_or_else(|| Error::Config("delivery.webhook_url is required".into()))?;
            Ok(Arc::new(WebhookSender::new(url, cfg.timeout_secs)?))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POSTs `{user_id, text}` to the configured webhook. The receiving side
/// (the chat transport connector) owns actual user-facing delivery.
pub struct WebhookSender {
    url: String,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl MessageSender for WebhookSender {
    async fn send(&self, user_id: &str, text: &str) {
        let payload = serde_json::json!({
            "user_id": user_id,
            "text": text,
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(user_id = %user_id, "outbound message delivered");
            }
            Ok(resp) => {
                tracing::warn!(
                    user_id = %user_id,
                    status = %resp.status(),
                    "outbound webhook returned non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "outbound delivery failed");
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logs outbound messages instead of sending them (dev and tests).
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send(&self, user_id: &str, text: &str) {
        tracing::info!(user_id = %user_id, text = %text, "outbound message");
    }
}

/// Prints outbound messages to stdout — what the chat REPL reads.
pub struct ConsoleSender;

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send(&self, _user_id: &str, text: &str) {
        println!("wayfarer> {text}");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Records every send for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSender {
    sent: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, user_id: &str, text: &str) {
        self.sent.lock().push((user_id.to_owned(), text.to_owned()));
    }
}
