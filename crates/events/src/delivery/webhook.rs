//! Webhook notification with exponential-backoff retry.
//!
//! [`WebhookDispatcher`] POSTs a JSON envelope for each new alert to a
//! configured URL. Failed attempts are retried with backoff (1 s, 2 s, 4 s)
//! before the dispatch is reported as failed.

use std::time::Duration;

use async_trait::async_trait;
use herdwatch_core::alert::Alert;
use herdwatch_core::notify::{DispatchError, NotificationDispatcher};

use crate::bus::event_types;

/// Retry delays between attempts (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CHANNEL: &str = "webhook";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDispatcher
// ---------------------------------------------------------------------------

pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: RETRY_DELAYS.to_vec(),
        })
    }

    /// Override the backoff schedule. One retry is made per entry.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver an alert with retry. Returns on the first successful attempt.
    pub async fn deliver(&self, alert: &Alert) -> Result<(), WebhookError> {
        let payload = serde_json::json!({
            "eventType": event_types::ALERT_CREATED,
            "alert": alert,
        });

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        alert_id = alert.alert_id,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(&payload).await.inspect_err(|e| {
            tracing::error!(
                url = %self.url,
                alert_id = alert.alert_id,
                error = %e,
                "Webhook delivery failed after all retries"
            );
        })
    }

    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError> {
        self.deliver(alert)
            .await
            .map_err(|e| DispatchError::new(CHANNEL, e.to_string()))
    }

    fn channel_name(&self) -> &str {
        CHANNEL
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_url_and_default_backoff() {
        let dispatcher = WebhookDispatcher::new("http://localhost:9/hook").unwrap();
        assert_eq!(dispatcher.url(), "http://localhost:9/hook");
        assert_eq!(dispatcher.retry_delays, RETRY_DELAYS.to_vec());
        assert_eq!(dispatcher.channel_name(), "webhook");
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn webhook_error_display_request() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
