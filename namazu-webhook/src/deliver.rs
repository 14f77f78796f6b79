//! Delivery capability consumed by the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use namazu_types::{DeliveryResult, DeliveryTarget};
use tokio_util::sync::CancellationToken;

use crate::retry::RetryingSender;
use crate::sender::WebhookSender;

/// Something that can deliver a payload to a subscriber target.
///
/// The pipeline depends on this capability rather than on a concrete sender,
/// so tests can record deliveries without any network.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Deliver `payload` to `target` and describe the outcome.
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        target: &DeliveryTarget,
        payload: Bytes,
    ) -> DeliveryResult;
}

/// Single attempt; the target's retry policy is ignored.
#[async_trait]
impl Deliver for WebhookSender {
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        target: &DeliveryTarget,
        payload: Bytes,
    ) -> DeliveryResult {
        self.send(cancel, &target.url, target.secret.as_bytes(), payload)
            .await
    }
}

/// Attempts governed by the target's retry policy.
#[async_trait]
impl Deliver for RetryingSender {
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        target: &DeliveryTarget,
        payload: Bytes,
    ) -> DeliveryResult {
        self.send(cancel, target, payload).await
    }
}
