use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::notification_models::{ActionKind, Notification, NotificationAction, NotificationEvent};

pub type ActionHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Routes notification actions to navigation or to named callbacks.
#[derive(Clone)]
pub struct ActionRouter {
    handlers: Arc<DashMap<String, ActionHandler>>,
    events: broadcast::Sender<NotificationEvent>,
}

impl ActionRouter {
    pub fn new(events: broadcast::Sender<NotificationEvent>) -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Registers the callback run by `invoke` actions targeting `name`.
    /// Replaces any handler already registered under that name.
    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn unregister_handler(&self, name: &str) {
        self.handlers.remove(name);
    }

    /// Returns false when nothing could be run for `action`.
    pub fn dispatch(&self, notification: &Notification, action: &NotificationAction) -> bool {
        match action.target_kind {
            ActionKind::Navigate => {
                tracing::debug!("Navigating to {} from notification {}", action.target, notification.id);
                let _ = self.events.send(NotificationEvent::Navigate {
                    target: action.target.clone(),
                });
                true
            }
            ActionKind::Invoke => {
                // Clone out of the map so the handler runs without holding a shard lock.
                let handler = self.handlers.get(&action.target).map(|h| h.value().clone());
                match handler {
                    Some(handler) => {
                        handler(notification);
                        true
                    }
                    None => {
                        tracing::warn!("No handler registered for action target '{}'", action.target);
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::notification_models::NotificationSpec;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn sample() -> Notification {
        NotificationSpec::info("Questionnaire submitted", "").into_notification(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_invoke_runs_registered_handler() {
        let (tx, _) = broadcast::channel(8);
        let router = ActionRouter::new(tx);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        router.register_handler("retry-upload", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let ran = router.dispatch(&sample(), &NotificationAction::invoke("Retry", "retry-upload"));

        assert!(ran);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_invoke_target_does_nothing() {
        let (tx, _) = broadcast::channel(8);
        let router = ActionRouter::new(tx);

        assert!(!router.dispatch(&sample(), &NotificationAction::invoke("Retry", "missing")));
    }

    #[test]
    fn test_navigate_publishes_event() {
        let (tx, mut rx) = broadcast::channel(8);
        let router = ActionRouter::new(tx);

        assert!(router.dispatch(&sample(), &NotificationAction::navigate("Open", "/vendors/42")));

        match rx.try_recv().unwrap() {
            NotificationEvent::Navigate { target } => assert_eq!(target, "/vendors/42"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
