pub mod activity;
pub mod auth;
pub mod error;
pub mod notification;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use error::{AppError, Result};
pub use routes::create_router;
pub use state::{AppState, Config};

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use activity::{ActivityGateway, ActivityPoller};
use notification::{ControllerOptions, NotificationController};
use scheduler::{Clock, SessionClock, Timer, TokioTimer};

/// Wires one application session: a notification controller and an
/// activity poller sharing the same timer and clock.
pub fn build_session(
    config: Config,
    gateway: Arc<dyn ActivityGateway>,
    runtime: Handle,
) -> AppState {
    let timer: Arc<dyn Timer> = Arc::new(TokioTimer::new(runtime.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SessionClock::new());

    let notifications = NotificationController::new(
        ControllerOptions {
            capacity: config.max_active_notifications,
            progress_tick: Duration::from_millis(config.progress_tick_ms),
        },
        timer.clone(),
        clock.clone(),
    );

    let poller = ActivityPoller::with_fetch_limit(
        gateway,
        notifications.clone(),
        timer,
        clock,
        runtime,
        config.activity_fetch_limit,
    );

    AppState {
        config: Arc::new(config),
        notifications,
        poller,
    }
}
