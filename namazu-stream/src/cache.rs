//! Bounded memory of recently observed upstream ids.

use std::collections::{HashSet, VecDeque};

/// FIFO set of the most recent `capacity` ids.
///
/// Owned by the stream client's read loop; there is a single writer so no
/// locking is involved.
#[derive(Debug)]
pub struct SeenIdCache {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl SeenIdCache {
    /// Create an empty cache. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Record `id`. Returns `false` if it was already present.
    ///
    /// When the cache is full the oldest id is evicted first.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
