use std::sync::Arc;
use std::time::Duration;

use crate::activity::{ActivityPoller, PollSettings};
use crate::error::{AppError, Result};
use crate::notification::NotificationController;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notifications: NotificationController,
    pub poller: ActivityPoller,
}

impl AppState {
    /// Ends the session: polling stops first so nothing enqueues while the
    /// controller is torn down.
    pub fn shutdown(&self) {
        self.poller.stop_current();
        self.notifications.shutdown();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval_ms: u64,
    pub recency_window_ms: u64,
    pub max_active_notifications: usize,
    pub activity_fetch_limit: usize,
    pub progress_tick_ms: u64,
    pub token_store_path: String,
    pub token_store_key: String,
    pub poll_user_id: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            poll_interval_ms: 30_000,
            recency_window_ms: 120_000,
            max_active_notifications: 5,
            activity_fetch_limit: 5,
            progress_tick_ms: 100,
            token_store_path: "session.json".to_string(),
            token_store_key: "token".to_string(),
            poll_user_id: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let config = Self {
            api_base_url: text("API_BASE_URL", defaults.api_base_url),
            poll_interval_ms: parse(&lookup, "POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            recency_window_ms: parse(&lookup, "RECENCY_WINDOW_MS", defaults.recency_window_ms)?,
            max_active_notifications: parse(
                &lookup,
                "MAX_ACTIVE_NOTIFICATIONS",
                defaults.max_active_notifications,
            )?,
            activity_fetch_limit: parse(&lookup, "ACTIVITY_FETCH_LIMIT", defaults.activity_fetch_limit)?,
            progress_tick_ms: parse(&lookup, "PROGRESS_TICK_MS", defaults.progress_tick_ms)?,
            token_store_path: text("TOKEN_STORE_PATH", defaults.token_store_path),
            token_store_key: text("TOKEN_STORE_KEY", defaults.token_store_key),
            poll_user_id: lookup("POLL_USER_ID")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            host: text("HOST", defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
        };

        if config.max_active_notifications == 0 {
            return Err(AppError::Config(
                "MAX_ACTIVE_NOTIFICATIONS must be at least 1".to_string(),
            ));
        }
        if config.poll_interval_ms == 0 || config.progress_tick_ms == 0 {
            return Err(AppError::Config(
                "POLL_INTERVAL_MS and PROGRESS_TICK_MS must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn poll_settings(&self, user_id: impl Into<String>) -> PollSettings {
        PollSettings {
            user_id: user_id.into(),
            interval: Duration::from_millis(self.poll_interval_ms),
            recency_window: Duration::from_millis(self.recency_window_ms),
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", key, raw))),
        _ => Ok(default),
    }
}
