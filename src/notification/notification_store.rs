use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

use super::notification_models::{Notification, NotificationPatch, NotificationSpec};

pub const DEFAULT_CAPACITY: usize = 5;

/// Result of [`NotificationStore::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Added {
    pub notification: Notification,
    /// The oldest notification, pushed out to stay within capacity.
    pub evicted: Option<Notification>,
}

/// Bounded, insertion-ordered set of active notifications.
///
/// Pure state: no timers, no I/O. Every method leaves `len() <= capacity()`.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    items: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Inserts a new notification, evicting the oldest one (FIFO) when full.
    pub fn add(&mut self, spec: NotificationSpec, now: DateTime<Utc>) -> Added {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };

        let mut id = Uuid::new_v4();
        while self.contains(id) {
            id = Uuid::new_v4();
        }

        let notification = spec.into_notification(id, now);
        self.items.push_back(notification.clone());

        Added {
            notification,
            evicted,
        }
    }

    /// Removes `id` and returns it. Unknown ids are ignored.
    pub fn remove(&mut self, id: Uuid) -> Option<Notification> {
        let index = self.items.iter().position(|n| n.id == id)?;
        self.items.remove(index)
    }

    /// Merges `patch` into `id` and returns the updated record. Unknown ids are ignored.
    pub fn patch(&mut self, id: Uuid, patch: NotificationPatch) -> Option<Notification> {
        let notification = self.items.iter_mut().find(|n| n.id == id)?;
        patch.apply(notification);
        Some(notification.clone())
    }

    /// Empties the store and returns the ids that were active.
    pub fn clear(&mut self) -> Vec<Uuid> {
        self.items.drain(..).map(|n| n.id).collect()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
