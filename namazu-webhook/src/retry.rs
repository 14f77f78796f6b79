//! Retry of transient delivery failures with capped exponential backoff.

use bytes::Bytes;
use namazu_types::{DeliveryResult, DeliveryTarget};
use tokio_util::sync::CancellationToken;

use crate::sender::WebhookSender;

/// Whether an HTTP status code marks a transient failure.
///
/// `0` stands for "no response" (network error, timeout, cancellation).
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 0 | 408 | 429 | 500 | 502 | 503 | 504)
}

/// Whether a failed delivery is worth another attempt.
pub fn is_retryable(result: &DeliveryResult) -> bool {
    !result.success && is_retryable_status(result.status_code)
}

/// Wraps a [`WebhookSender`] with the retry policy carried by each target.
///
/// The first attempt is immediate. Retry `k` waits
/// `min(initial_ms * 2^(k-1), max_ms)` first. Terminal failures (any non-2xx
/// status other than 408, 429, 500, 502, 503, 504) end the loop at once.
#[derive(Debug, Clone)]
pub struct RetryingSender {
    sender: WebhookSender,
}

impl RetryingSender {
    /// Wrap `sender`.
    pub fn new(sender: WebhookSender) -> Self {
        Self { sender }
    }

    /// The underlying single-attempt sender.
    pub fn inner(&self) -> &WebhookSender {
        &self.sender
    }

    /// Deliver `payload` to `target`, retrying transient failures.
    ///
    /// `retry_count` in the returned result counts attempts made after the
    /// first. Cancelling `cancel` while waiting between attempts returns the
    /// last failed result immediately.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        target: &DeliveryTarget,
        payload: Bytes,
    ) -> DeliveryResult {
        let policy = target.retry;
        let secret = target.secret.as_bytes();

        let mut result = self
            .sender
            .send(cancel, &target.url, secret, payload.clone())
            .await;
        let mut retries = 0;

        while is_retryable(&result) && retries < policy.retries() {
            let attempt = retries + 1;
            let delay = policy.delay(attempt);
            tracing::debug!(
                subscription_id = %target.subscription_id,
                url = %target.url,
                status = result.status_code,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Delivery failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    result.retry_count = retries;
                    return result;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            result = self
                .sender
                .send(cancel, &target.url, secret, payload.clone())
                .await;
            retries = attempt;
        }

        result.retry_count = retries;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(0, true)]
    #[case(408, true)]
    #[case(429, true)]
    #[case(500, true)]
    #[case(502, true)]
    #[case(503, true)]
    #[case(504, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(403, false)]
    #[case(404, false)]
    #[case(422, false)]
    #[case(501, false)]
    #[case(301, false)]
    fn test_status_classification(#[case] status: u16, #[case] retryable: bool) {
        assert_eq!(is_retryable_status(status), retryable);
    }

    #[test]
    fn test_success_is_never_retryable() {
        let result = DeliveryResult::from_status("https://a", 200, Duration::ZERO);
        assert!(!is_retryable(&result));
    }
}
