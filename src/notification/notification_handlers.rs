use crate::{
    error::{AppError, Result},
    notification::{EnqueueNotificationResponse, Notification, NotificationPatch, NotificationSpec},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    Json,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use uuid::Uuid;

/// Active notifications, oldest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Active notifications", body = Vec<Notification>)
    ),
    tag = "notifications"
)]
pub async fn get_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifications.snapshot())
}

/// Enqueue a notification
#[utoipa::path(
    post,
    path = "/api/notifications",
    request_body = NotificationSpec,
    responses(
        (status = 201, description = "Notification enqueued", body = EnqueueNotificationResponse),
        (status = 400, description = "Invalid notification")
    ),
    tag = "notifications"
)]
pub async fn create_notification(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NotificationSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<EnqueueNotificationResponse>)> {
    let Json(spec) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let id = state.notifications.enqueue(spec)?;

    Ok((StatusCode::CREATED, Json(EnqueueNotificationResponse { id })))
}

/// Update an active notification
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    request_body = NotificationPatch,
    responses(
        (status = 200, description = "Notification updated", body = Notification),
        (status = 400, description = "Invalid patch"),
        (status = 404, description = "Notification is no longer active")
    ),
    tag = "notifications"
)]
pub async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<NotificationPatch>, JsonRejection>,
) -> Result<Json<Notification>> {
    let Json(patch) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    state
        .notifications
        .update(id, patch)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

/// Dismiss a notification. Dismissing one that is already gone succeeds.
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification dismissed")
    ),
    tag = "notifications"
)]
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    state.notifications.dismiss(id);
    StatusCode::NO_CONTENT
}

/// Dismiss every notification
#[utoipa::path(
    delete,
    path = "/api/notifications",
    responses(
        (status = 204, description = "All notifications cleared")
    ),
    tag = "notifications"
)]
pub async fn clear_notifications(State(state): State<AppState>) -> StatusCode {
    state.notifications.clear();
    StatusCode::NO_CONTENT
}

/// Run one of a notification's actions
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/actions/{index}",
    params(
        ("id" = Uuid, Path, description = "Notification ID"),
        ("index" = usize, Path, description = "Action position")
    ),
    responses(
        (status = 204, description = "Action run"),
        (status = 404, description = "No such notification, action, or handler")
    ),
    tag = "notifications"
)]
pub async fn run_notification_action(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<StatusCode> {
    if state.notifications.run_action(id, index) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Action not found".to_string()))
    }
}

/// Subscribe to notification changes via Server-Sent Events
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of notification events")
    ),
    tag = "notifications"
)]
pub async fn notification_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.notifications.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    tracing::error!("Could not serialize notification event: {:?}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Notification stream lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
