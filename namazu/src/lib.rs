//! # namazu
//!
//! Relays real-time earthquake reports from the P2PQuake WebSocket feed to
//! subscriber webhooks.
//!
//! ```text
//! P2PQuake ──ws──▶ StreamClient ──(dedup, normalize)──▶ Pipeline
//!                                                          │ list_all + filter
//!                                                          ▼
//!                                     RetryingSender ──signed POST──▶ subscribers
//! ```
//!
//! Subscriptions are managed through a small HTTP API ([`api`]) that checks
//! every webhook URL and runs the ownership challenge before storing it.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;

pub use api::{routes, ApiContext, ApiServer, SubscriptionRequest, SubscriptionView};
pub use config::RelayConfig;
pub use error::{ConfigError, PipelineError, Result, ServerError};
pub use logging::{init_logging, LoggingError, LoggingMode};
pub use pipeline::{fan_out, FanOutSummary, Pipeline};
pub use store::{MemoryEventRepository, MemorySubscriptionStore, DEFAULT_EVENT_HISTORY};
