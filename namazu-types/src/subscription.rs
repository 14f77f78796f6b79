//! Subscriber registrations as read by the relay.

use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryTarget;
use crate::error::SubscriptionError;
use crate::filter::Filter;
use crate::retry::RetryPolicy;

/// Minimum length, in bytes, of a webhook signing secret.
pub const MIN_SECRET_LEN: usize = 16;

/// Delivery mechanisms a subscription can use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    /// Signed HTTP POST to a subscriber endpoint
    #[default]
    Webhook,
}

/// Where and how to deliver events for one subscription.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Delivery mechanism
    #[serde(rename = "type", default)]
    pub delivery_type: DeliveryType,
    /// Target endpoint
    #[serde(default)]
    pub url: String,
    /// Shared HMAC secret
    #[serde(default)]
    pub secret: String,
    /// Retry settings; the default policy applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_type", &self.delivery_type)
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl Delivery {
    /// Effective retry policy for this delivery.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_default()
    }

    /// Check the structural invariants of a webhook delivery.
    ///
    /// URL safety is checked separately by the webhook URL validator.
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        match self.delivery_type {
            DeliveryType::Webhook => {
                if self.url.trim().is_empty() {
                    return Err(SubscriptionError::MissingUrl);
                }
                if self.secret.is_empty() {
                    return Err(SubscriptionError::MissingSecret);
                }
                if self.secret.len() < MIN_SECRET_LEN {
                    return Err(SubscriptionError::SecretTooShort {
                        min: MIN_SECRET_LEN,
                        actual: self.secret.len(),
                    });
                }
            }
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

/// A subscriber's declared interest plus its delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription id
    pub id: String,
    /// Owning user; empty for legacy rows
    #[serde(default)]
    pub owner: String,
    /// Human-readable label
    #[serde(default)]
    pub name: String,
    /// Delivery settings
    pub delivery: Delivery,
    /// Optional event filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

impl Subscription {
    /// Delivery target handed to the senders.
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget {
            subscription_id: self.id.clone(),
            url: self.delivery.url.clone(),
            secret: self.delivery.secret.clone(),
            retry: self.delivery.retry_policy(),
        }
    }

    /// Check the subscription's delivery invariants.
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        self.delivery.validate()
    }
}
