use crate::{
    activity::{self, ActivityRecord, ActivityStatus, AnnounceTemplate, PollerStatus, StartPollingRequest},
    notification::{
        self, ActionKind, Category, EnqueueNotificationResponse, Notification, NotificationAction,
        NotificationEvent, NotificationPatch, NotificationSpec, RemovalReason,
    },
    state::AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification::notification_handlers::get_notifications,
        notification::notification_handlers::create_notification,
        notification::notification_handlers::update_notification,
        notification::notification_handlers::dismiss_notification,
        notification::notification_handlers::clear_notifications,
        notification::notification_handlers::run_notification_action,
        notification::notification_handlers::notification_stream,
        activity::activity_handlers::get_polling_status,
        activity::activity_handlers::start_polling,
        activity::activity_handlers::stop_polling,
    ),
    components(
        schemas(
            Notification,
            NotificationSpec,
            NotificationPatch,
            NotificationAction,
            NotificationEvent,
            EnqueueNotificationResponse,
            Category,
            ActionKind,
            RemovalReason,
            ActivityRecord,
            ActivityStatus,
            AnnounceTemplate,
            StartPollingRequest,
            PollerStatus,
        )
    ),
    tags(
        (name = "notifications", description = "Notification lifecycle endpoints"),
        (name = "polling", description = "Activity polling control")
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let notification_routes = Router::new()
        .route(
            "/",
            get(notification::get_notifications)
                .post(notification::create_notification)
                .delete(notification::clear_notifications),
        )
        .route("/stream", get(notification::notification_stream))
        .route(
            "/:id",
            axum::routing::patch(notification::update_notification)
                .delete(notification::dismiss_notification),
        )
        .route("/:id/actions/:index", post(notification::run_notification_action));

    let polling_routes = Router::new()
        .route("/", get(activity::get_polling_status))
        .route("/start", post(activity::start_polling))
        .route("/stop", post(activity::stop_polling));

    let api_routes = Router::new()
        .nest("/notifications", notification_routes)
        .nest("/polling", polling_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
