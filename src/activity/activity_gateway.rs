use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenStore;
use crate::error::{AppError, Result};

use super::activity_models::ActivityRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of recent activity records for a user.
#[async_trait]
pub trait ActivityGateway: Send + Sync {
    async fn fetch_recent(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityRecord>>;
}

/// `GET {base}/activities/recent?limit=&userId=` over HTTP.
#[derive(Clone)]
pub struct HttpActivityGateway {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl HttpActivityGateway {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }
}

#[async_trait]
impl ActivityGateway for HttpActivityGateway {
    async fn fetch_recent(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityRecord>> {
        let url = format!("{}/activities/recent", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string()), ("userId", user_id.to_string())]);

        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized(format!(
                "activity gateway rejected credentials ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(AppError::Gateway(status));
        }

        let records = response.json::<Vec<ActivityRecord>>().await?;
        tracing::debug!("Fetched {} activity records for user {}", records.len(), user_id);

        Ok(records)
    }
}
