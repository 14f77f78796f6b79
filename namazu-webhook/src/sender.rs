//! Single-attempt signed webhook delivery.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::join_all;
use namazu_types::{DeliveryResult, DeliveryTarget};
use reqwest::header::{CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::signature;

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = "namazu/1.0";

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Signature-256";

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Most response body bytes read and discarded after the status arrives.
/// The connection is dropped instead of drained past this point.
pub const RESPONSE_DRAIN_LIMIT: usize = 64 * 1024;

/// Configuration for [`WebhookSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Upper bound on one request, including reading the response body
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Value of the `User-Agent` header
    /// Default: `namazu/1.0`
    pub user_agent: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl SenderConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Issues one signed POST per call and reports what happened.
///
/// The sender is cheap to clone and safe to share between tasks; clones
/// reuse the same connection pool.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    config: SenderConfig,
}

impl WebhookSender {
    /// Build a sender with its own HTTP client.
    ///
    /// Redirects are not followed: a subscriber endpoint that redirects is
    /// reported with its 3xx status.
    pub fn new(config: SenderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    /// Build a sender around an existing client.
    pub fn with_client(client: reqwest::Client, config: SenderConfig) -> Self {
        Self { client, config }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// POST `payload` to `url`, signed with `secret`.
    ///
    /// The request is bounded by the configured timeout and by `cancel`,
    /// whichever fires first. Network failures, timeouts and cancellation
    /// yield `status_code == 0`.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        url: &str,
        secret: &[u8],
        payload: Bytes,
    ) -> DeliveryResult {
        let started = Instant::now();
        let request = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature::sign(secret, &payload))
            .header(USER_AGENT_HEADER, self.config.user_agent.as_str())
            .body(payload);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = execute(request) => Some(result),
        };
        let elapsed = started.elapsed();

        match outcome {
            None => DeliveryResult::transport_failure(url, "delivery cancelled", elapsed),
            Some(Ok(status)) => DeliveryResult::from_status(url, status, elapsed),
            Some(Err(e)) => {
                let message = if e.is_timeout() {
                    format!("request timed out after {:?}", self.config.timeout)
                } else {
                    format!("request failed: {e}")
                };
                DeliveryResult::transport_failure(url, message, elapsed)
            }
        }
    }

    /// Deliver the same payload to every target concurrently, one attempt each.
    ///
    /// Results are returned in the order of `targets`.
    pub async fn send_all(
        &self,
        cancel: &CancellationToken,
        targets: &[DeliveryTarget],
        payload: Bytes,
    ) -> Vec<DeliveryResult> {
        let sends = targets.iter().map(|target| {
            self.send(cancel, &target.url, target.secret.as_bytes(), payload.clone())
        });
        join_all(sends).await
    }
}

/// Perform the request and discard up to [`RESPONSE_DRAIN_LIMIT`] bytes of
/// the response body.
async fn execute(request: reqwest::RequestBuilder) -> std::result::Result<u16, reqwest::Error> {
    let mut response = request.send().await?;
    let status = response.status().as_u16();

    // The status is already known; a body read failure does not change the outcome.
    let mut drained = 0;
    while drained < RESPONSE_DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => drained += chunk.len(),
            Ok(None) | Err(_) => break,
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SenderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "namazu/1.0");
    }

    #[test]
    fn test_builder() {
        let config = SenderConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let sender = WebhookSender::new(SenderConfig::default()).unwrap();
        let cancel = CancellationToken::new();

        // Port 9 (discard) on loopback is almost never listening.
        let result = sender
            .send(&cancel, "http://127.0.0.1:9/hook", b"secret", Bytes::from_static(b"{}"))
            .await;

        assert_eq!(result.status_code, 0);
        assert!(!result.success);
        assert!(result.error_message.is_some());
        assert_eq!(result.retry_count, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let sender = WebhookSender::new(SenderConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = sender
            .send(&cancel, "http://127.0.0.1:9/hook", b"secret", Bytes::new())
            .await;

        assert_eq!(result.status_code, 0);
        assert_eq!(result.error_message.as_deref(), Some("delivery cancelled"));
    }
}
