use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Activity ids already announced, with the time they were announced.
///
/// Entries live for one recency window; within it an id is announced at
/// most once.
#[derive(Debug, Default, Clone)]
pub struct AnnouncedSet {
    entries: HashMap<String, DateTime<Utc>>,
}

impl AnnouncedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, activity_id: &str) -> bool {
        self.entries.contains_key(activity_id)
    }

    pub fn announced_at(&self, activity_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(activity_id).copied()
    }

    /// Returns false if `activity_id` was already present.
    pub fn insert(&mut self, activity_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        let activity_id = activity_id.into();
        if self.entries.contains_key(&activity_id) {
            return false;
        }
        self.entries.insert(activity_id, at);
        true
    }

    /// Drops entries announced more than `window` before `now`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, announced_at| now - *announced_at <= window);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
