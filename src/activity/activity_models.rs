use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::Result;
use crate::notification::{Category, NotificationAction, NotificationSpec};

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl ActivityStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ActivityStatus::Success | ActivityStatus::Failed)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Pending => write!(f, "pending"),
            ActivityStatus::InProgress => write!(f, "in_progress"),
            ActivityStatus::Success => write!(f, "success"),
            ActivityStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Notification template the backend suggests for an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceTemplate {
    pub title: Option<String>,
    pub message: Option<String>,
    pub category: Option<String>,
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

/// Backend-side event returned by the activity gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ActivityStatus,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub announce_as: Option<AnnounceTemplate>,
}

impl ActivityRecord {
    /// Terminal and no older than `window` at `now`.
    pub fn is_announceable(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.status.is_terminal() && now - self.created_at <= window
    }

    /// Notification announcing this record. Falls back to the default template
    /// when the backend's suggestion does not validate.
    pub fn to_notification(&self) -> NotificationSpec {
        let spec = match &self.announce_as {
            Some(template) => match self.from_template(template) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!("Ignoring announce template of activity {}: {}", self.id, e);
                    self.default_notification()
                }
            },
            None => self.default_notification(),
        };

        spec.with_source_activity(self.id.clone())
            .with_metadata("activityType", self.kind.clone().into())
    }

    fn from_template(&self, template: &AnnounceTemplate) -> Result<NotificationSpec> {
        let fallback = self.default_notification();
        let category = match &template.category {
            Some(category) => category.parse::<Category>()?,
            None => fallback.category,
        };

        let spec = NotificationSpec {
            category,
            title: template.title.clone().unwrap_or(fallback.title),
            message: template.message.clone().unwrap_or(fallback.message),
            duration_ms: template.duration_ms.unwrap_or(fallback.duration_ms),
            show_progress: template.show_progress,
            actions: template.actions.clone(),
            ..fallback
        };
        spec.validate()?;
        Ok(spec)
    }

    fn default_notification(&self) -> NotificationSpec {
        let message: String = self.description.chars().take(MAX_MESSAGE_CHARS).collect();
        match self.status {
            ActivityStatus::Failed => NotificationSpec::error("Activity failed", message),
            _ => NotificationSpec::success("Activity completed", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ActivityStatus, age_secs: i64, now: DateTime<Utc>) -> ActivityRecord {
        ActivityRecord {
            id: "act-1".into(),
            kind: "vendor_assessment".into(),
            status,
            description: "Assessment for Acme Corp finished".into(),
            created_at: now - chrono::Duration::seconds(age_secs),
            announce_as: None,
        }
    }

    #[test]
    fn test_record_deserializes_from_gateway_json() {
        let json = r#"{
            "id": "a1",
            "type": "document_upload",
            "status": "in_progress",
            "description": "SOC2 report",
            "createdAt": "2024-05-01T10:00:00Z",
            "announceAs": {"title": "Uploaded", "category": "info", "durationMs": 3000}
        }"#;
        let record: ActivityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, "document_upload");
        assert_eq!(record.status, ActivityStatus::InProgress);
        assert_eq!(record.announce_as.unwrap().duration_ms, Some(3000));
    }

    #[test]
    fn test_only_recent_terminal_records_are_announceable() {
        let now = Utc::now();
        let window = chrono::Duration::seconds(120);

        assert!(record(ActivityStatus::Success, 10, now).is_announceable(now, window));
        assert!(record(ActivityStatus::Failed, 120, now).is_announceable(now, window));
        assert!(!record(ActivityStatus::Success, 121, now).is_announceable(now, window));
        assert!(!record(ActivityStatus::Pending, 1, now).is_announceable(now, window));
        assert!(!record(ActivityStatus::InProgress, 1, now).is_announceable(now, window));
    }

    #[test]
    fn test_default_template_follows_status() {
        let now = Utc::now();
        let ok = record(ActivityStatus::Success, 0, now).to_notification();
        assert_eq!(ok.category, Category::Success);
        assert_eq!(ok.source_activity_id.as_deref(), Some("act-1"));

        let failed = record(ActivityStatus::Failed, 0, now).to_notification();
        assert_eq!(failed.category, Category::Error);
    }

    #[test]
    fn test_template_overrides_defaults() {
        let now = Utc::now();
        let mut r = record(ActivityStatus::Success, 0, now);
        r.announce_as = Some(AnnounceTemplate {
            title: Some("Vendor review approved".into()),
            category: Some("info".into()),
            duration_ms: Some(0),
            ..AnnounceTemplate::default()
        });

        let spec = r.to_notification();
        assert_eq!(spec.title, "Vendor review approved");
        assert_eq!(spec.category, Category::Info);
        assert_eq!(spec.duration_ms, 0);
        assert_eq!(spec.message, "Assessment for Acme Corp finished");
    }

    #[test]
    fn test_invalid_template_falls_back() {
        let now = Utc::now();
        let mut r = record(ActivityStatus::Success, 0, now);
        r.announce_as = Some(AnnounceTemplate {
            title: Some("Done".into()),
            category: Some("celebration".into()),
            ..AnnounceTemplate::default()
        });

        let spec = r.to_notification();
        assert_eq!(spec.title, "Activity completed");
        assert_eq!(spec.category, Category::Success);
    }
}
