//! Configuration for the upstream stream client.

use std::time::Duration;

use crate::error::{Result, StreamError};

/// Public P2PQuake WebSocket feed.
pub const DEFAULT_ENDPOINT: &str = "wss://api.p2pquake.net/v2/ws";

/// Source tag stamped on every emitted event.
pub const DEFAULT_SOURCE: &str = "p2pquake";

/// Configuration for the [`StreamClient`](crate::StreamClient)
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint to dial
    /// Default: `wss://api.p2pquake.net/v2/ws`
    pub endpoint: String,

    /// Source tag written into `Event::source`
    /// Default: `p2pquake`
    pub source: String,

    /// Age at which a healthy connection is dropped and redialed. The
    /// upstream evicts clients after 10 minutes.
    /// Default: 540 seconds (9 minutes)
    pub reconnect_interval: Duration,

    /// Number of recently seen event ids remembered for deduplication
    /// Default: 1000
    pub seen_cache_capacity: usize,

    /// Capacity of the channel between the client and its consumer
    /// Default: 64
    pub event_buffer: usize,

    /// First delay after a failed dial
    /// Default: 1 second
    pub dial_backoff_initial: Duration,

    /// Upper bound on the dial backoff
    /// Default: 60 seconds
    pub dial_backoff_max: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            reconnect_interval: Duration::from_secs(540),
            seen_cache_capacity: 1000,
            event_buffer: 64,
            dial_backoff_initial: Duration::from_secs(1),
            dial_backoff_max: Duration::from_secs(60),
        }
    }
}

impl StreamConfig {
    /// Default configuration pointed at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_seen_cache_capacity(mut self, capacity: usize) -> Self {
        self.seen_cache_capacity = capacity;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    pub fn with_dial_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.dial_backoff_initial = initial;
        self.dial_backoff_max = max;
        self
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| StreamError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(StreamError::InvalidEndpoint(format!(
                "{}: scheme must be ws or wss",
                self.endpoint
            )));
        }

        if self.reconnect_interval == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Reconnect interval must be greater than 0".to_string(),
            ));
        }

        if self.seen_cache_capacity == 0 {
            return Err(StreamError::Configuration(
                "Seen cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(StreamError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.dial_backoff_initial == Duration::ZERO
            || self.dial_backoff_initial > self.dial_backoff_max
        {
            return Err(StreamError::Configuration(
                "Dial backoff must be non-zero with initial <= max".to_string(),
            ));
        }

        Ok(())
    }
}
