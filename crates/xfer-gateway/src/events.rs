//! Settlement event publishers.
//!
//! Publishing is best-effort. Neither publisher retries, and callers only
//! log the result.

use async_trait::async_trait;
use url::Url;
use xfer_core::{EventPublisher, PublishError, SettlementEvent};

/// POSTs each event as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookEventPublisher {
    http: reqwest::Client,
    url: Url,
}

impl WebhookEventPublisher {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl EventPublisher for WebhookEventPublisher {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), PublishError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| PublishError(format!("webhook unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(PublishError(format!("webhook returned {}", resp.status())));
        }
        Ok(())
    }
}

/// Writes each event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &SettlementEvent) -> Result<(), PublishError> {
        tracing::info!(
            target: "xfer::events",
            transfer_id = %event.transfer_id,
            tx_hash = %event.receipt.tx_hash,
            amount = %event.amount,
            sender_reference = %event.sender_reference,
            receiver_reference = %event.receiver_reference,
            "settlement event"
        );
        Ok(())
    }
}
