use crate::{
    activity::{PollerStatus, StartPollingRequest},
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Duration;

/// Current poller state
#[utoipa::path(
    get,
    path = "/api/polling",
    responses(
        (status = 200, description = "Poller status", body = PollerStatus)
    ),
    tag = "polling"
)]
pub async fn get_polling_status(State(state): State<AppState>) -> Json<PollerStatus> {
    Json(state.poller.status())
}

/// Start (or restart) activity polling
#[utoipa::path(
    post,
    path = "/api/polling/start",
    request_body = StartPollingRequest,
    responses(
        (status = 200, description = "Polling started", body = PollerStatus),
        (status = 400, description = "No user id or invalid settings")
    ),
    tag = "polling"
)]
pub async fn start_polling(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StartPollingRequest>, JsonRejection>,
) -> Result<Json<PollerStatus>> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let user_id = payload
        .user_id
        .or_else(|| state.config.poll_user_id.clone())
        .ok_or_else(|| AppError::BadRequest("userId is required".to_string()))?;

    let mut settings = state.config.poll_settings(user_id);
    if let Some(interval_ms) = payload.interval_ms {
        settings.interval = Duration::from_millis(interval_ms);
    }
    if let Some(window_ms) = payload.recency_window_ms {
        settings.recency_window = Duration::from_millis(window_ms);
    }

    state.poller.start(settings)?;
    Ok(Json(state.poller.status()))
}

/// Stop activity polling
#[utoipa::path(
    post,
    path = "/api/polling/stop",
    responses(
        (status = 200, description = "Polling stopped", body = PollerStatus)
    ),
    tag = "polling"
)]
pub async fn stop_polling(State(state): State<AppState>) -> Json<PollerStatus> {
    state.poller.stop_current();
    Json(state.poller.status())
}
