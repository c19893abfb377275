use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Read access to the bearer token kept by the login flow.
///
/// Refreshing the token is the login flow's job; this side only reads it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Token stored under `key` in a JSON key-value file.
///
/// The file is read on every call so a token written by a fresh login is
/// picked up by the next poll.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn bearer_token(&self) -> Option<String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!("No token store at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let values: Value = match serde_json::from_str(&contents) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Token store {} is not valid JSON: {}", self.path.display(), e);
                return None;
            }
        };

        values
            .get(&self.key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore(Option<String>);

impl StaticTokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenStore for StaticTokenStore {
    async fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_token_under_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"token": "abc123", "theme": "dark"}}"#).unwrap();

        let store = FileTokenStore::new(file.path(), "token");
        assert_eq!(store.bearer_token().await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_missing_file_or_key_yields_none() {
        assert!(FileTokenStore::new("/nonexistent/session.json", "token")
            .bearer_token()
            .await
            .is_none());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"token": ""}}"#).unwrap();
        assert!(FileTokenStore::new(file.path(), "token").bearer_token().await.is_none());
        assert!(FileTokenStore::new(file.path(), "other").bearer_token().await.is_none());
    }

    #[tokio::test]
    async fn test_static_store() {
        assert_eq!(StaticTokenStore::new("t").bearer_token().await.as_deref(), Some("t"));
        assert!(StaticTokenStore::empty().bearer_token().await.is_none());
    }
}
