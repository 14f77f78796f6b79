//! In-memory repositories.
//!
//! Nothing here survives a restart. Persistent adapters implement the same
//! traits from `namazu_types`.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use namazu_types::{
    Event, EventRepository, RepositoryError, Subscription, SubscriptionRepository,
    SubscriptionStore,
};
use parking_lot::Mutex;

/// Default number of events kept by [`MemoryEventRepository`].
pub const DEFAULT_EVENT_HISTORY: usize = 1000;

/// Subscriptions keyed by id in a concurrent map.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: DashMap<String, Subscription>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[async_trait]
impl SubscriptionRepository for MemorySubscriptionStore {
    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let mut all: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Subscription>, RepositoryError> {
        let mut owned: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn get(&self, id: &str) -> Result<Subscription, RepositoryError> {
        self.subscriptions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        use dashmap::mapref::entry::Entry;

        match self.subscriptions.entry(subscription.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyExists(subscription.id)),
            Entry::Vacant(slot) => {
                slot.insert(subscription);
                Ok(())
            }
        }
    }

    async fn update(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        match self.subscriptions.get_mut(&subscription.id) {
            Some(mut existing) => {
                *existing = subscription;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(subscription.id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.subscriptions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// Keeps the most recent events, oldest evicted first.
#[derive(Debug)]
pub struct MemoryEventRepository {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl MemoryEventRepository {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Stored events, oldest first.
    pub fn recent(&self) -> Vec<Event> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for MemoryEventRepository {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_HISTORY)
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepository {
    async fn create(&self, event: &Event) -> Result<(), RepositoryError> {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}
