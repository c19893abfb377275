use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of "now" for timestamps and recency checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time anchored once, then advanced by the tokio monotonic clock.
///
/// Timestamps never jump backwards with system clock adjustments, and they
/// follow virtual time when the runtime is paused.
#[derive(Debug, Clone)]
pub struct SessionClock {
    anchor: DateTime<Utc>,
    started: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SessionClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor + elapsed
    }
}
