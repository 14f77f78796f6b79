//! Error types for the namazu crate.

use std::path::PathBuf;

use namazu_stream::StreamError;

/// Fatal errors from the relay pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The upstream stream client could not be started
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Errors starting the management HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound
    #[error("Failed to bind management API: {0}")]
    Bind(#[from] warp::Error),
}

/// Problems loading or validating the relay configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience type alias for Results using PipelineError.
pub type Result<T> = std::result::Result<T, PipelineError>;
