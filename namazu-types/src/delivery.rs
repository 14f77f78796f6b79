//! Delivery targets and per-delivery outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Everything a sender needs to deliver one payload to one subscriber.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Subscription this target belongs to, used for logging
    pub subscription_id: String,
    /// Endpoint to POST to
    pub url: String,
    /// HMAC secret for the signature header
    pub secret: String,
    /// Retry policy applied by the retrying sender
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("subscription_id", &self.subscription_id)
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

/// Outcome of delivering one payload to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Endpoint that was targeted
    pub url: String,
    /// HTTP status, or 0 when no response was received
    pub status_code: u16,
    /// True iff the status was 2xx
    pub success: bool,
    /// Description of the failure, if any
    pub error_message: Option<String>,
    /// Wall time of the last attempt
    #[serde(with = "duration_ms")]
    pub response_time: Duration,
    /// Attempts made after the first one
    pub retry_count: u32,
}

impl DeliveryResult {
    /// Result for a received HTTP response.
    pub fn from_status(url: impl Into<String>, status_code: u16, response_time: Duration) -> Self {
        let success = (200..300).contains(&status_code);
        Self {
            url: url.into(),
            status_code,
            success,
            error_message: (!success).then(|| format!("unexpected status: {status_code}")),
            response_time,
            retry_count: 0,
        }
    }

    /// Result for a request that produced no response.
    pub fn transport_failure(
        url: impl Into<String>,
        error_message: impl Into<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            success: false,
            error_message: Some(error_message.into()),
            response_time,
            retry_count: 0,
        }
    }

    /// Whether no HTTP response was received.
    pub fn is_transport_error(&self) -> bool {
        self.status_code == 0
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
