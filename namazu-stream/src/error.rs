//! Error types for the namazu-stream crate.

/// Errors surfaced by the stream client to its owner.
///
/// Transport failures after a successful `connect` are never returned;
/// the client reconnects with backoff instead.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The configured endpoint is not a usable WebSocket URL
    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `connect` was called on a client that is already running or closed
    #[error("Stream client already started")]
    AlreadyStarted,
}

/// Reasons a single upstream frame could not be turned into an event.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not valid JSON or has the wrong shape
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// An earthquake frame without its stable identifier
    #[error("Earthquake frame has no id")]
    MissingId,
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let error = StreamError::InvalidEndpoint("http://example.com".to_string());
        assert_eq!(error.to_string(), "Invalid stream endpoint: http://example.com");

        let error = StreamError::Configuration("event buffer must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: event buffer must be greater than 0"
        );
    }

    #[test]
    fn test_frame_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: FrameError = json_error.into();
        assert!(error.to_string().starts_with("Failed to decode frame"));
        assert_eq!(FrameError::MissingId.to_string(), "Earthquake frame has no id");
    }
}
