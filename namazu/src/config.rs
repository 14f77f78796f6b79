//! Relay configuration, loaded from TOML.
//!
//! Every key has a default, so an empty file (or no file at all) yields a
//! relay pointed at the public P2PQuake feed with the management API on
//! `127.0.0.1:8080`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use namazu_stream::{StreamConfig, DEFAULT_ENDPOINT, DEFAULT_SOURCE};
use namazu_webhook::SenderConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upstream feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind; only `p2pquake` is supported.
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: String,

    /// WebSocket endpoint (`ws://` or `wss://`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Seconds before a healthy connection is rotated.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Number of recent event ids kept for deduplication.
    #[serde(default = "default_seen_cache_capacity")]
    pub seen_cache_capacity: usize,

    /// Events buffered between the stream client and the pipeline.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default = "default_dial_backoff_initial")]
    pub dial_backoff_initial_ms: u64,

    #[serde(default = "default_dial_backoff_max")]
    pub dial_backoff_max_ms: u64,
}

fn default_source_type() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_reconnect_interval() -> u64 {
    540
}

fn default_seen_cache_capacity() -> usize {
    1000
}

fn default_event_buffer() -> usize {
    64
}

fn default_dial_backoff_initial() -> u64 {
    1000
}

fn default_dial_backoff_max() -> u64 {
    60_000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_type: default_source_type(),
            endpoint: default_endpoint(),
            reconnect_interval_secs: default_reconnect_interval(),
            seen_cache_capacity: default_seen_cache_capacity(),
            event_buffer: default_event_buffer(),
            dial_backoff_initial_ms: default_dial_backoff_initial(),
            dial_backoff_max_ms: default_dial_backoff_max(),
        }
    }
}

/// Management HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind address.
    #[serde(default = "default_api_addr")]
    pub addr: String,

    /// Whether to serve the API at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_api_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: default_api_addr(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Accept `http://localhost`-style webhook URLs. Development only.
    #[serde(default)]
    pub allow_local_webhooks: bool,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Per-request timeout for webhook deliveries.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for the URL-ownership challenge.
    #[serde(default = "default_timeout_ms")]
    pub challenge_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            challenge_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.source_type != DEFAULT_SOURCE {
            return Err(ConfigError::Invalid(format!(
                "source.type must be \"{DEFAULT_SOURCE}\", got \"{}\"",
                self.source.source_type
            )));
        }

        self.stream_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("source: {e}")))?;

        if self.delivery.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery.timeout_ms must be > 0".into(),
            ));
        }
        if self.delivery.challenge_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery.challenge_timeout_ms must be > 0".into(),
            ));
        }

        self.api_addr()?;
        Ok(())
    }

    /// Settings for the upstream stream client.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            endpoint: self.source.endpoint.clone(),
            source: self.source.source_type.clone(),
            reconnect_interval: Duration::from_secs(self.source.reconnect_interval_secs),
            seen_cache_capacity: self.source.seen_cache_capacity,
            event_buffer: self.source.event_buffer,
            dial_backoff_initial: Duration::from_millis(self.source.dial_backoff_initial_ms),
            dial_backoff_max: Duration::from_millis(self.source.dial_backoff_max_ms),
        }
    }

    /// Settings for the webhook sender.
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig::default().with_timeout(Duration::from_millis(self.delivery.timeout_ms))
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery.challenge_timeout_ms)
    }

    /// Parsed management API bind address.
    pub fn api_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.api
            .addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("api.addr {:?}: {e}", self.api.addr)))
    }
}
