use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::scheduler::{Clock, TickControl, Timer, TimerToken};

use super::notification_actions::ActionRouter;
use super::notification_models::{
    Notification, NotificationEvent, NotificationPatch, NotificationSpec, RemovalReason,
};
use super::notification_store::{NotificationStore, DEFAULT_CAPACITY};

pub const DEFAULT_PROGRESS_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub capacity: usize,
    pub progress_tick: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            progress_tick: DEFAULT_PROGRESS_TICK,
        }
    }
}

#[derive(Debug, Default)]
struct NotificationTimers {
    expiry: Option<TimerToken>,
    progress: Option<TimerToken>,
}

struct Inner {
    store: Mutex<NotificationStore>,
    timers: DashMap<Uuid, NotificationTimers>,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<NotificationEvent>,
    actions: ActionRouter,
    progress_tick: Duration,
}

/// Owns the notification store for one application session and drives
/// auto-dismiss, progress countdown and capacity eviction.
///
/// Cheap to clone; every clone talks to the same store.
#[derive(Clone)]
pub struct NotificationController {
    inner: Arc<Inner>,
}

impl NotificationController {
    pub fn new(options: ControllerOptions, timer: Arc<dyn Timer>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(256);
        let actions = ActionRouter::new(events.clone());

        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(NotificationStore::new(options.capacity)),
                timers: DashMap::new(),
                timer,
                clock,
                events,
                actions,
                progress_tick: options.progress_tick,
            }),
        }
    }

    /// Validates `spec`, stores it and arms its timers.
    pub fn enqueue(&self, spec: NotificationSpec) -> Result<Uuid> {
        spec.validate()?;

        let now = self.inner.clock.now();
        let added = self.inner.store.lock().add(spec, now);

        if let Some(evicted) = added.evicted {
            self.cancel_timers(evicted.id);
            debug!("Evicted notification {} to stay within capacity", evicted.id);
            self.publish(NotificationEvent::Removed {
                id: evicted.id,
                reason: RemovalReason::Evicted,
            });
        }

        let notification = added.notification;
        let id = notification.id;
        self.arm_timers(&notification);

        debug!(
            "Enqueued {} notification {}: {}",
            notification.category, id, notification.title
        );
        self.publish(NotificationEvent::Added { notification });

        Ok(id)
    }

    /// Cancels the timers of `id` and removes it. Returns false if it was
    /// already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.remove_with(id, RemovalReason::Dismissed)
    }

    /// Validates `patch` and merges it into `id`. `Ok(None)` when the
    /// notification is no longer active.
    pub fn update(&self, id: Uuid, patch: NotificationPatch) -> Result<Option<Notification>> {
        patch.validate()?;
        Ok(self.patch_stored(id, patch))
    }

    /// Runs action `index` of notification `id` without touching the
    /// notification itself. Returns false when nothing ran.
    pub fn run_action(&self, id: Uuid, index: usize) -> bool {
        let found = {
            let store = self.inner.store.lock();
            store
                .get(id)
                .and_then(|n| n.actions.get(index).cloned().map(|a| (n.clone(), a)))
        };

        match found {
            Some((notification, action)) => self.inner.actions.dispatch(&notification, &action),
            None => false,
        }
    }

    pub fn clear(&self) {
        let armed: Vec<Uuid> = self.inner.timers.iter().map(|entry| *entry.key()).collect();
        for id in armed {
            self.cancel_timers(id);
        }

        let cleared = self.inner.store.lock().clear();
        if !cleared.is_empty() {
            debug!("Cleared {} notifications", cleared.len());
        }
        self.publish(NotificationEvent::Cleared);
    }

    /// Active notifications, oldest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.store.lock().snapshot()
    }

    pub fn get(&self, id: Uuid) -> Option<Notification> {
        self.inner.store.lock().get(id).cloned()
    }

    pub fn capacity(&self) -> usize {
        self.inner.store.lock().capacity()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }

    pub fn actions(&self) -> &ActionRouter {
        &self.inner.actions
    }

    /// Ends the session: no timer fires after this returns.
    pub fn shutdown(&self) {
        self.clear();
        info!("Notification controller shut down");
    }

    fn arm_timers(&self, notification: &Notification) {
        if notification.duration_ms == 0 {
            return;
        }

        let id = notification.id;
        let weak = Arc::downgrade(&self.inner);
        let expiry = self.inner.timer.schedule(
            Duration::from_millis(notification.duration_ms),
            Box::new(move || {
                if let Some(controller) = Self::upgrade(&weak) {
                    controller.remove_with(id, RemovalReason::Expired);
                }
            }),
        );

        let progress = notification.show_progress.then(|| {
            let weak = Arc::downgrade(&self.inner);
            let created_at = notification.created_at;
            let duration_ms = notification.duration_ms;
            self.inner.timer.schedule_repeating(
                self.inner.progress_tick,
                Box::new(move || match Self::upgrade(&weak) {
                    Some(controller) => controller.tick_progress(id, created_at, duration_ms),
                    None => TickControl::Stop,
                }),
            )
        });

        self.inner.timers.insert(
            id,
            NotificationTimers {
                expiry: Some(expiry),
                progress,
            },
        );

        // A very short timer may already have fired before it was recorded.
        if !self.inner.store.lock().contains(id) {
            self.cancel_timers(id);
        }
    }

    fn patch_stored(&self, id: Uuid, patch: NotificationPatch) -> Option<Notification> {
        let updated = self.inner.store.lock().patch(id, patch)?;
        self.publish(NotificationEvent::Updated {
            notification: updated.clone(),
        });
        Some(updated)
    }

    fn tick_progress(&self, id: Uuid, created_at: DateTime<Utc>, duration_ms: u64) -> TickControl {
        let elapsed_ms = (self.inner.clock.now() - created_at).num_milliseconds().max(0) as f64;
        let progress = (100.0 * (1.0 - elapsed_ms / duration_ms as f64)).max(0.0) as f32;

        match self.patch_stored(id, NotificationPatch::progress(progress)) {
            Some(_) if progress > 0.0 => TickControl::Continue,
            Some(_) => {
                if let Some(mut timers) = self.inner.timers.get_mut(&id) {
                    timers.progress = None;
                }
                TickControl::Stop
            }
            None => TickControl::Stop,
        }
    }

    fn remove_with(&self, id: Uuid, reason: RemovalReason) -> bool {
        self.cancel_timers(id);

        let removed = self.inner.store.lock().remove(id);
        match removed {
            Some(_) => {
                debug!("Removed notification {} ({:?})", id, reason);
                self.publish(NotificationEvent::Removed { id, reason });
                true
            }
            None => false,
        }
    }

    fn cancel_timers(&self, id: Uuid) {
        if let Some((_, timers)) = self.inner.timers.remove(&id) {
            for token in [timers.expiry, timers.progress].into_iter().flatten() {
                self.inner.timer.cancel(token);
            }
        }
    }

    fn publish(&self, event: NotificationEvent) {
        // No subscribers is fine; the snapshot is the source of truth.
        let _ = self.inner.events.send(event);
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::notification::notification_models::NotificationAction;
    use crate::scheduler::{SessionClock, TokioTimer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::runtime::Handle;

    fn controller_with(capacity: usize) -> (NotificationController, Arc<TokioTimer>) {
        let timer = Arc::new(TokioTimer::new(Handle::current()));
        let controller = NotificationController::new(
            ControllerOptions {
                capacity,
                ..ControllerOptions::default()
            },
            timer.clone(),
            Arc::new(SessionClock::new()),
        );
        (controller, timer)
    }

    fn titles(controller: &NotificationController) -> Vec<String> {
        controller.snapshot().into_iter().map(|n| n.title).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_first() {
        let (controller, _) = controller_with(5);

        for i in 1..=6 {
            controller
                .enqueue(NotificationSpec::info(format!("N{}", i), "").with_duration_ms(0))
                .unwrap();
            assert!(controller.snapshot().len() <= 5);
        }

        assert_eq!(titles(&controller), vec!["N2", "N3", "N4", "N5", "N6"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_expires_after_its_duration() {
        let (controller, timer) = controller_with(5);
        let id = controller
            .enqueue(NotificationSpec::success("N1", "").with_duration_ms(1000))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(controller.get(id).is_some());

        tokio::time::sleep(Duration::from_millis(501)).await;
        assert!(controller.get(id).is_none());
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_persists() {
        let (controller, timer) = controller_with(5);
        let id = controller
            .enqueue(NotificationSpec::error("Upload failed", "").with_duration_ms(0))
            .unwrap();
        assert_eq!(timer.pending(), 0);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(controller.get(id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_is_idempotent_and_cancels_timers() {
        let (controller, timer) = controller_with(5);
        let id = controller
            .enqueue(NotificationSpec::info("Sync", "").with_duration_ms(2000).with_progress())
            .unwrap();
        assert_eq!(timer.pending(), 2);

        assert!(controller.dismiss(id));
        assert_eq!(timer.pending(), 0);
        assert!(!controller.dismiss(id));
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_after_expiry_is_a_no_op() {
        let (controller, _) = controller_with(5);
        let keep = controller
            .enqueue(NotificationSpec::info("Keep", "").with_duration_ms(0))
            .unwrap();
        let id = controller
            .enqueue(NotificationSpec::info("Short", "").with_duration_ms(100))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let before = controller.snapshot();

        assert!(!controller.dismiss(id));
        assert_eq!(controller.snapshot(), before);
        assert!(controller.get(keep).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_cancels_timers_of_evicted() {
        let (controller, timer) = controller_with(2);
        let first = controller
            .enqueue(NotificationSpec::info("a", "").with_duration_ms(10_000))
            .unwrap();
        controller
            .enqueue(NotificationSpec::info("b", "").with_duration_ms(10_000))
            .unwrap();
        controller
            .enqueue(NotificationSpec::info("c", "").with_duration_ms(10_000))
            .unwrap();

        assert!(controller.get(first).is_none());
        assert_eq!(timer.pending(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_counts_down_and_stops_at_zero() {
        let (controller, timer) = controller_with(5);
        let id = controller
            .enqueue(NotificationSpec::info("Export", "").with_duration_ms(1000).with_progress())
            .unwrap();
        assert_eq!(controller.get(id).unwrap().progress, Some(100.0));

        tokio::time::sleep(Duration::from_millis(550)).await;
        let progress = controller.get(id).unwrap().progress.unwrap();
        assert!((49.0..=51.0).contains(&progress), "progress was {}", progress);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(controller.get(id).is_none());
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_notification_never_enters_the_store() {
        let (controller, _) = controller_with(5);

        let err = controller
            .enqueue(NotificationSpec::info("", "no title"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = controller
            .enqueue(NotificationSpec::info("Bad", "").with_duration_ms(-10))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_turn_enqueues_keep_order() {
        let (controller, _) = controller_with(5);
        controller.enqueue(NotificationSpec::info("first", "")).unwrap();
        controller.enqueue(NotificationSpec::info("second", "")).unwrap();

        assert_eq!(titles(&controller), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_and_events() {
        let (controller, _) = controller_with(5);
        let mut events = controller.subscribe();

        let id = controller
            .enqueue(NotificationSpec::info("Saving vendor", "").with_duration_ms(0))
            .unwrap();
        let updated = controller
            .update(
                id,
                NotificationPatch {
                    title: Some("Vendor saved".into()),
                    ..NotificationPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Vendor saved");
        assert!(controller
            .update(Uuid::new_v4(), NotificationPatch::default())
            .unwrap()
            .is_none());
        controller.dismiss(id);

        assert!(matches!(events.try_recv().unwrap(), NotificationEvent::Added { .. }));
        assert!(matches!(events.try_recv().unwrap(), NotificationEvent::Updated { .. }));
        assert!(matches!(
            events.try_recv().unwrap(),
            NotificationEvent::Removed {
                reason: RemovalReason::Dismissed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_patch_leaves_notification_untouched() {
        let (controller, _) = controller_with(5);
        let mut events = controller.subscribe();
        let id = controller
            .enqueue(NotificationSpec::info("Uploading evidence", "").with_duration_ms(0))
            .unwrap();

        let result = controller.update(
            id,
            NotificationPatch {
                title: Some(String::new()),
                message: Some("x".repeat(5000)),
                ..NotificationPatch::default()
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        let stored = controller.get(id).unwrap();
        assert_eq!(stored.title, "Uploading evidence");
        assert!(stored.message.is_empty());
        assert!(matches!(events.try_recv().unwrap(), NotificationEvent::Added { .. }));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_action_does_not_dismiss() {
        let (controller, _) = controller_with(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        controller.actions().register_handler("reopen-questionnaire", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let id = controller
            .enqueue(
                NotificationSpec::warning("Questionnaire overdue", "")
                    .with_action(NotificationAction::invoke("Reopen", "reopen-questionnaire")),
            )
            .unwrap();

        assert!(controller.run_action(id, 0));
        assert!(!controller.run_action(id, 1));
        assert!(!controller.run_action(Uuid::new_v4(), 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(controller.get(id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let (controller, timer) = controller_with(5);
        for i in 0..3 {
            controller
                .enqueue(NotificationSpec::info(format!("n{}", i), "").with_progress())
                .unwrap();
        }
        assert_eq!(timer.pending(), 6);

        controller.shutdown();

        assert_eq!(timer.pending(), 0);
        assert!(controller.snapshot().is_empty());
    }
}
