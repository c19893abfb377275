use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

pub const DEFAULT_DURATION_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Success,
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Success => write!(f, "success"),
            Category::Error => write!(f, "error"),
            Category::Warning => write!(f, "warning"),
            Category::Info => write!(f, "info"),
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Category::Success),
            "error" => Ok(Category::Error),
            "warning" => Ok(Category::Warning),
            "info" => Ok(Category::Info),
            other => Err(AppError::Validation(format!(
                "unknown notification category '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Invoke,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    #[validate(length(min = 1, max = 80))]
    pub label: String,
    pub target_kind: ActionKind,
    #[validate(length(min = 1))]
    pub target: String,
}

impl NotificationAction {
    pub fn navigate(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_kind: ActionKind::Navigate,
            target: target.into(),
        }
    }

    pub fn invoke(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_kind: ActionKind::Invoke,
            target: target.into(),
        }
    }
}

/// An active notification as held by the store and shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub category: Category,
    pub title: String,
    pub message: String,
    /// `0` keeps the notification until it is dismissed.
    pub duration_ms: u64,
    pub show_progress: bool,
    /// Countdown from 100 to 0, present only while a progress bar is shown.
    pub progress: Option<f32>,
    pub actions: Vec<NotificationAction>,
    pub created_at: DateTime<Utc>,
    pub source_activity_id: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

impl Notification {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.duration_ms == 0 {
            return None;
        }
        Some(self.created_at + chrono::Duration::milliseconds(self.duration_ms as i64))
    }
}

/// What callers hand to `enqueue`. Validated before it reaches the store.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    pub category: Category,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub message: String,
    #[serde(default = "default_duration_ms")]
    #[validate(range(min = 0))]
    pub duration_ms: i64,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    #[validate(nested)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub source_activity_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

fn default_duration_ms() -> i64 {
    DEFAULT_DURATION_MS
}

impl NotificationSpec {
    pub fn new(category: Category, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            title: title.into(),
            message: message.into(),
            duration_ms: DEFAULT_DURATION_MS,
            show_progress: false,
            actions: Vec::new(),
            source_activity_id: None,
            metadata: Map::new(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Info, title, message)
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_source_activity(mut self, activity_id: impl Into<String>) -> Self {
        self.source_activity_id = Some(activity_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the stored record. Callers must have validated `self` first.
    pub(crate) fn into_notification(self, id: Uuid, created_at: DateTime<Utc>) -> Notification {
        let duration_ms = self.duration_ms.max(0) as u64;
        let show_progress = self.show_progress && duration_ms > 0;
        Notification {
            id,
            category: self.category,
            title: self.title,
            message: self.message,
            duration_ms,
            show_progress,
            progress: show_progress.then_some(100.0),
            actions: self.actions,
            created_at,
            source_activity_id: self.source_activity_id,
            metadata: self.metadata,
        }
    }
}

/// Partial update merged into an active notification. Text fields follow
/// the same limits as [`NotificationSpec`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    pub category: Option<Category>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
    pub progress: Option<f32>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, Value>>,
}

impl NotificationPatch {
    pub fn progress(progress: f32) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, notification: &mut Notification) {
        if let Some(category) = self.category {
            notification.category = category;
        }
        if let Some(title) = self.title {
            notification.title = title;
        }
        if let Some(message) = self.message {
            notification.message = message;
        }
        if let Some(progress) = self.progress {
            notification.progress = Some(progress.clamp(0.0, 100.0));
        }
        if let Some(metadata) = self.metadata {
            notification.metadata = metadata;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Dismissed,
    Expired,
    Evicted,
}

/// Change feed published by the controller for the presentation layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Added { notification: Notification },
    Updated { notification: Notification },
    Removed { id: Uuid, reason: RemovalReason },
    Cleared,
    Navigate { target: String },
}
