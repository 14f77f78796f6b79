//! Error types shared across the relay crates.

/// Errors raised by subscription and event repositories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No subscription exists with the given id
    #[error("Subscription not found: {0}")]
    NotFound(String),

    /// A subscription with the same id is already stored
    #[error("Subscription already exists: {0}")]
    AlreadyExists(String),

    /// The backing store could not complete the operation
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Structural problems with a subscription's delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Webhook deliveries need a target URL
    #[error("webhook url is required")]
    MissingUrl,

    /// Webhook deliveries need a signing secret
    #[error("webhook secret is required")]
    MissingSecret,

    /// The signing secret is shorter than the minimum length
    #[error("webhook secret must be at least {min} bytes (got {actual})")]
    SecretTooShort {
        /// Minimum accepted length
        min: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Retry settings are inconsistent
    #[error("invalid retry policy: {0}")]
    InvalidRetry(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let error = RepositoryError::NotFound("sub-1".to_string());
        assert_eq!(error.to_string(), "Subscription not found: sub-1");

        let error = RepositoryError::Storage("disk full".to_string());
        assert_eq!(error.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_subscription_error_display() {
        let error = SubscriptionError::SecretTooShort { min: 16, actual: 4 };
        assert_eq!(
            error.to_string(),
            "webhook secret must be at least 16 bytes (got 4)"
        );
        assert_eq!(
            SubscriptionError::MissingUrl.to_string(),
            "webhook url is required"
        );
    }
}
