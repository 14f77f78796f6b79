//! Error types for the namazu-webhook crate.

use crate::url_policy::UrlValidationError;

/// Errors raised while constructing webhook components.
///
/// Delivery itself never fails with this type; see `DeliveryResult`.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// A subscriber URL failed validation
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
}

/// Convenience type alias for Results using WebhookError.
pub type Result<T> = std::result::Result<T, WebhookError>;
