use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::notification::{NotificationController, NotificationSpec};
use crate::scheduler::{Clock, TickControl, Timer, TimerToken};

use super::activity_gateway::ActivityGateway;
use super::activity_models::ActivityRecord;
use super::announced_set::AnnouncedSet;

pub const DEFAULT_FETCH_LIMIT: usize = 5;
const FAILURE_NOTICE_DURATION_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub user_id: String,
    pub interval: Duration,
    pub recency_window: Duration,
}

/// Identifies one `start` call; stopping with a stale handle does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerHandle {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerStatus {
    Idle,
    #[serde(rename_all = "camelCase")]
    Running {
        user_id: String,
        interval_ms: u64,
        recency_window_ms: u64,
        announced: usize,
    },
}

struct ActiveRun {
    generation: u64,
    settings: PollSettings,
    window: chrono::Duration,
    token: TimerToken,
}

#[derive(Default)]
struct PollerState {
    run: Option<ActiveRun>,
    generation: u64,
    in_flight: bool,
    failure_streak: u32,
    announced: AnnouncedSet,
}

struct Inner {
    gateway: Arc<dyn ActivityGateway>,
    notifications: NotificationController,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    fetch_limit: usize,
    state: Mutex<PollerState>,
}

/// Polls the activity gateway and announces each new terminal activity at
/// most once through the notification controller.
#[derive(Clone)]
pub struct ActivityPoller {
    inner: Arc<Inner>,
}

impl ActivityPoller {
    pub fn new(
        gateway: Arc<dyn ActivityGateway>,
        notifications: NotificationController,
        timer: Arc<dyn Timer>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Self {
        Self::with_fetch_limit(gateway, notifications, timer, clock, runtime, DEFAULT_FETCH_LIMIT)
    }

    pub fn with_fetch_limit(
        gateway: Arc<dyn ActivityGateway>,
        notifications: NotificationController,
        timer: Arc<dyn Timer>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
        fetch_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                notifications,
                timer,
                clock,
                runtime,
                fetch_limit: fetch_limit.max(1),
                state: Mutex::new(PollerState::default()),
            }),
        }
    }

    /// Starts polling, replacing any run already in progress. The first poll
    /// happens immediately.
    pub fn start(&self, settings: PollSettings) -> Result<PollerHandle> {
        if settings.interval.is_zero() {
            return Err(AppError::Validation("poll interval must be positive".into()));
        }
        if settings.user_id.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".into()));
        }
        let window = chrono::Duration::from_std(settings.recency_window)
            .map_err(|_| AppError::Validation("recency window out of range".into()))?;

        let generation = {
            let mut state = self.inner.state.lock();
            if let Some(previous) = state.run.take() {
                self.inner.timer.cancel(previous.token);
                debug!("Replacing poll run {}", previous.generation);
            }

            state.generation += 1;
            state.failure_streak = 0;
            let generation = state.generation;

            let weak = Arc::downgrade(&self.inner);
            let token = self.inner.timer.schedule_repeating(
                settings.interval,
                Box::new(move || match Self::upgrade(&weak) {
                    Some(poller) => {
                        poller.tick(generation);
                        TickControl::Continue
                    }
                    None => TickControl::Stop,
                }),
            );

            info!(
                "Polling activities for user {} every {:?} (recency window {:?})",
                settings.user_id, settings.interval, settings.recency_window
            );
            state.run = Some(ActiveRun {
                generation,
                settings,
                window,
                token,
            });
            generation
        };

        self.tick(generation);
        Ok(PollerHandle { generation })
    }

    /// Stops the run `handle` belongs to. A fetch already in flight finishes
    /// but its result is dropped.
    pub fn stop(&self, handle: PollerHandle) -> bool {
        let mut state = self.inner.state.lock();
        let current = state
            .run
            .as_ref()
            .is_some_and(|run| run.generation == handle.generation);
        if !current {
            return false;
        }
        Self::halt(&self.inner, &mut state);
        true
    }

    /// Stops whatever run is active.
    pub fn stop_current(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.run.is_none() {
            return false;
        }
        Self::halt(&self.inner, &mut state);
        true
    }

    pub fn status(&self) -> PollerStatus {
        let state = self.inner.state.lock();
        match &state.run {
            Some(run) => PollerStatus::Running {
                user_id: run.settings.user_id.clone(),
                interval_ms: run.settings.interval.as_millis() as u64,
                recency_window_ms: run.settings.recency_window.as_millis() as u64,
                announced: state.announced.len(),
            },
            None => PollerStatus::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().run.is_some()
    }

    fn halt(inner: &Inner, state: &mut PollerState) {
        if let Some(run) = state.run.take() {
            inner.timer.cancel(run.token);
            info!("Stopped polling activities for user {}", run.settings.user_id);
        }
    }

    fn tick(&self, generation: u64) {
        let user_id = {
            let mut state = self.inner.state.lock();
            let user_id = match &state.run {
                Some(run) if run.generation == generation => run.settings.user_id.clone(),
                _ => return,
            };
            if state.in_flight {
                debug!("Previous activity poll still in flight, skipping tick");
                return;
            }
            state.in_flight = true;
            user_id
        };

        let poller = self.clone();
        let limit = self.inner.fetch_limit;
        self.inner.runtime.spawn(async move {
            let result = poller.inner.gateway.fetch_recent(&user_id, limit).await;
            poller.apply(generation, result);
        });
    }

    /// Runs entirely under the state lock, so once `stop` returns no result
    /// of the stopped run reaches the notification store. The controller never
    /// takes this lock.
    fn apply(&self, generation: u64, result: Result<Vec<ActivityRecord>>) {
        let mut state = self.inner.state.lock();
        state.in_flight = false;

        let window = match &state.run {
            Some(run) if run.generation == generation => run.window,
            _ => {
                debug!("Dropping activity poll result from a stopped run");
                return;
            }
        };

        let mut announcements = Vec::new();
        match result {
            Ok(records) => {
                if state.failure_streak > 0 {
                    info!(
                        "Activity gateway recovered after {} failed polls",
                        state.failure_streak
                    );
                }
                state.failure_streak = 0;

                let now = self.inner.clock.now();
                let pruned = state.announced.prune(now, window);
                if pruned > 0 {
                    debug!("Pruned {} announced activities", pruned);
                }

                for record in records {
                    if !record.is_announceable(now, window) || state.announced.contains(&record.id) {
                        continue;
                    }
                    state.announced.insert(record.id.clone(), now);
                    debug!("Announcing activity {} ({})", record.id, record.status);
                    announcements.push(record.to_notification());
                }
            }
            Err(err) => {
                state.failure_streak += 1;
                if state.failure_streak == 1 {
                    if err.is_transient() {
                        warn!("Activity poll failed: {}", err);
                    } else {
                        error!("Activity poll failed: {}", err);
                    }
                    announcements.push(failure_notice(&err));
                } else {
                    debug!(
                        "Activity poll failed again ({} in a row): {}",
                        state.failure_streak, err
                    );
                }
            }
        }

        for spec in announcements {
            if let Err(e) = self.inner.notifications.enqueue(spec) {
                warn!("Could not enqueue activity notification: {}", e);
            }
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

fn failure_notice(err: &AppError) -> NotificationSpec {
    let message = match err {
        AppError::Unauthorized(_) => {
            "Your session has expired. Sign in again to keep receiving activity updates."
        }
        err if err.is_transient() => {
            "Could not reach the activity service. Updates will resume automatically."
        }
        _ => "The activity service returned an unexpected response.",
    };
    NotificationSpec::error("Activity updates unavailable", message)
        .with_duration_ms(FAILURE_NOTICE_DURATION_MS)
}
