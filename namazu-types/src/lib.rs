//! # namazu-types
//!
//! Shared vocabulary for the namazu relay: the normalized earthquake
//! [`Event`], subscriber [`Subscription`]s with their [`Filter`] and
//! [`RetryPolicy`], the per-attempt [`DeliveryResult`], and the repository
//! capabilities the pipeline reads subscribers from and persists events to.
//!
//! This crate has no I/O of its own. Transport lives in `namazu-webhook`,
//! the upstream connection in `namazu-stream`.

mod delivery;
mod error;
mod event;
mod filter;
mod repository;
mod retry;
mod subscription;

pub use delivery::{DeliveryResult, DeliveryTarget};
pub use error::{RepositoryError, SubscriptionError};
pub use event::{Event, EventType};
pub use filter::{passes, Filter};
pub use repository::{EventRepository, SubscriptionRepository, SubscriptionStore};
pub use retry::RetryPolicy;
pub use subscription::{Delivery, DeliveryType, Subscription, MIN_SECRET_LEN};
