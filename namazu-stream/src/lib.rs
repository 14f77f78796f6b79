//! # namazu-stream
//!
//! Inbound side of the relay. [`StreamClient`] keeps a WebSocket open to the
//! P2PQuake feed, rotating it before the upstream's forced disconnect and
//! redialing with backoff when it drops. Every frame goes through a
//! [`FrameProcessor`]: frames other than earthquake reports (`code = 551`) are
//! skipped, ids seen recently are dropped, and the rest are normalized into
//! [`namazu_types::Event`]s that keep the original bytes.
//!
//! ```rust,no_run
//! use namazu_stream::{StreamClient, StreamConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cancel = CancellationToken::new();
//! let mut client = StreamClient::new(StreamConfig::default());
//! let mut events = client.connect(&cancel).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} severity={}", event.id, event.severity);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod error;
pub mod frame;
mod normalizer;
mod processor;

pub use cache::SeenIdCache;
pub use client::{ConnectionState, EventSource, StreamClient};
pub use config::{StreamConfig, DEFAULT_ENDPOINT, DEFAULT_SOURCE};
pub use error::{FrameError, Result, StreamError};
pub use normalizer::{normalize, parse_source_time, severity_from_scale};
pub use processor::{FrameOutcome, FrameProcessor};
