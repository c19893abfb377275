// Declare submodules
pub mod notification_actions;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_service;
pub mod notification_store;

// Re-export public items
pub use notification_actions::{ActionHandler, ActionRouter};
pub use notification_dto::EnqueueNotificationResponse;
pub use notification_handlers::{
    clear_notifications, create_notification, dismiss_notification, get_notifications,
    notification_stream, run_notification_action, update_notification,
};
pub use notification_models::{
    ActionKind, Category, Notification, NotificationAction, NotificationEvent, NotificationPatch,
    NotificationSpec, RemovalReason,
};
pub use notification_service::{ControllerOptions, NotificationController};
pub use notification_store::NotificationStore;
