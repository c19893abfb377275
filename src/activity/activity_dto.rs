use serde::Deserialize;
use utoipa::ToSchema;

/// Unset fields fall back to the configured defaults.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartPollingRequest {
    pub user_id: Option<String>,
    pub interval_ms: Option<u64>,
    pub recency_window_ms: Option<u64>,
}
