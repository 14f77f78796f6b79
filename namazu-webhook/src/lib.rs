//! # namazu-webhook
//!
//! Outbound side of the relay: everything needed to put a signed payload on
//! a subscriber's endpoint and to prove that the subscriber owns it.
//!
//! - [`signature`]: `sha256=<hex>` HMAC header values and constant-time checks
//! - [`WebhookSender`]: one signed POST, reported as a [`DeliveryResult`]
//! - [`RetryingSender`]: retry of transient failures with capped exponential backoff
//! - [`Challenger`]: the `url_verification` ownership handshake
//! - [`validate_webhook_url`]: scheme and address checks for subscriber URLs
//!
//! Senders never return errors; every outcome, including cancellation, is
//! described by the returned result value.
//!
//! [`DeliveryResult`]: namazu_types::DeliveryResult

mod challenge;
mod deliver;
mod error;
mod retry;
mod sender;
pub mod signature;
mod url_policy;

pub use challenge::{generate_challenge_token, ChallengeResult, Challenger, CHALLENGE_BODY_LIMIT};
pub use deliver::Deliver;
pub use error::{Result, WebhookError};
pub use retry::{is_retryable, is_retryable_status, RetryingSender};
pub use sender::{
    SenderConfig, WebhookSender, DEFAULT_TIMEOUT, RESPONSE_DRAIN_LIMIT, SIGNATURE_HEADER, USER_AGENT,
};
pub use url_policy::{validate_webhook_url, UrlValidationError};
