//! Storage capabilities the relay depends on.
//!
//! The pipeline only ever reads subscriptions and appends events. Mutations
//! live on [`SubscriptionStore`] and are used by the management surface.
//! Cancellation is expressed by dropping the returned futures.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::event::Event;
use crate::subscription::Subscription;

/// Read access to subscriber registrations.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Every subscription, across all owners.
    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError>;

    /// Subscriptions belonging to `owner`.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Subscription>, RepositoryError>;

    /// One subscription by id.
    ///
    /// Returns `RepositoryError::NotFound` when no such subscription exists.
    async fn get(&self, id: &str) -> Result<Subscription, RepositoryError>;
}

/// Write access to subscriber registrations.
#[async_trait]
pub trait SubscriptionStore: SubscriptionRepository {
    /// Insert a new subscription; fails if the id is taken.
    async fn create(&self, subscription: Subscription) -> Result<(), RepositoryError>;

    /// Replace an existing subscription in place.
    async fn update(&self, subscription: Subscription) -> Result<(), RepositoryError>;

    /// Remove a subscription by id.
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Append-only event persistence. Failures are logged by callers, never fatal.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist one event.
    async fn create(&self, event: &Event) -> Result<(), RepositoryError>;
}
