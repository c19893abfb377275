use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Opaque handle returned by [`Timer::schedule`], used to cancel the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Returned by repeating tasks to decide whether they fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

pub type OneShotTask = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() -> TickControl + Send + 'static>;

/// Deferred-execution capability shared by the notification controller and
/// the activity poller.
///
/// Implementations must make `cancel` idempotent: cancelling a token that
/// already fired, was already cancelled, or was never issued is a no-op.
pub trait Timer: Send + Sync {
    /// Runs `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: OneShotTask) -> TimerToken;

    /// Runs `task` every `period` (first run after one period) until it
    /// returns [`TickControl::Stop`] or the token is cancelled.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerToken;

    fn cancel(&self, token: TimerToken);
}

/// [`Timer`] backed by tokio tasks. Follows `tokio::time`, so a paused
/// runtime drives it on virtual time.
#[derive(Clone)]
pub struct TokioTimer {
    handle: Handle,
    next_token: Arc<AtomicU64>,
    tasks: Arc<DashMap<TimerToken, AbortHandle>>,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_token: Arc::new(AtomicU64::new(1)),
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Number of tasks that are scheduled and not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    fn issue_token(&self) -> TimerToken {
        TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: OneShotTask) -> TimerToken {
        let token = self.issue_token();
        let tasks = self.tasks.clone();
        let deadline = Instant::now() + delay;
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        // The task waits until its abort handle is registered, so its own
        // `remove` can never run before the insert below.
        let join = self.handle.spawn(async move {
            let _ = registered_rx.await;
            tokio::time::sleep_until(deadline).await;
            tasks.remove(&token);
            task();
        });

        self.tasks.insert(token, join.abort_handle());
        let _ = registered_tx.send(());
        token
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerToken {
        let token = self.issue_token();
        let tasks = self.tasks.clone();
        let first = Instant::now() + period;
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let join = self.handle.spawn(async move {
            let _ = registered_rx.await;
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if task() == TickControl::Stop {
                    break;
                }
            }
            tasks.remove(&token);
        });

        self.tasks.insert(token, join.abort_handle());
        let _ = registered_tx.send(());
        token
    }

    fn cancel(&self, token: TimerToken) {
        if let Some((_, abort)) = self.tasks.remove(&token) {
            abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_after_delay() {
        let timer = TokioTimer::new(Handle::current());
        let (count, seen) = counter();

        timer.schedule(
            Duration::from_millis(1000),
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing_and_is_idempotent() {
        let timer = TokioTimer::new(Handle::current());
        let (count, seen) = counter();

        let token = timer.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        timer.cancel(token);
        timer.cancel(token);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_stops_when_task_says_so() {
        let timer = TokioTimer::new(Handle::current());
        let (count, seen) = counter();

        timer.schedule_repeating(
            Duration::from_millis(100),
            Box::new(move || {
                let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 3 {
                    TickControl::Stop
                } else {
                    TickControl::Continue
                }
            }),
        );

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_immediate_tasks_leave_nothing_pending() {
        let timer = TokioTimer::new(Handle::current());
        let (count, seen) = counter();

        for _ in 0..200 {
            let count = count.clone();
            timer.schedule(
                Duration::ZERO,
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        while seen.load(Ordering::SeqCst) < 200 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // Let the last tasks finish their bookkeeping.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(timer.pending(), 0);
    }
}
