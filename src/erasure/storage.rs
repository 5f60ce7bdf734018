use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage rejected removal of {bucket}/{key}: HTTP {status}")]
    Rejected {
        bucket: String,
        key: String,
        status: u16,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Binary object storage organised in buckets
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn remove(&self, bucket: &str, key: &str) -> Result<RemoveOutcome, StorageError>;
}

/// Storage REST API: `DELETE {base}/storage/v1/object/{bucket}/{key}`
pub struct HttpObjectStorage {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl HttpObjectStorage {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self, StorageError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            service_key: service_key.to_string(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or(StorageError::NotConfigured("STORAGE_BASE_URL"))?;
        let service_key = config
            .service_key
            .as_deref()
            .ok_or(StorageError::NotConfigured("STORAGE_SERVICE_KEY"))?;
        Self::new(
            base_url,
            service_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Keys taken from stored URLs are already percent-encoded and pass
    /// through unchanged; bare keys are encoded by the parser
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StorageError> {
        let raw = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            bucket,
            key.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| StorageError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn remove(&self, bucket: &str, key: &str) -> Result<RemoveOutcome, StorageError> {
        let url = self.object_url(bucket, key)?;
        debug!(bucket, key, "removing storage object");

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(RemoveOutcome::Removed);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(RemoveOutcome::NotFound);
        }
        // Some storage gateways answer a missing object with 400 + "not_found"
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.to_ascii_lowercase().contains("not_found")
                || body.to_ascii_lowercase().contains("not found")
            {
                return Ok(RemoveOutcome::NotFound);
            }
        }
        Err(StorageError::Rejected {
            bucket: bucket.to_string(),
            key: key.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Resolve a stored reference into an object key inside `bucket`.
///
/// Accepts full storage URLs (`.../storage/v1/object/public/{bucket}/{key}`,
/// also `sign` and `authenticated`, with or without a query string) and bare
/// keys. Returns `None` when the URL names another bucket or carries no key.
pub fn object_key(bucket: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let Ok(url) = Url::parse(raw) else {
        let key = raw.trim_start_matches('/');
        let key = key
            .strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key);
        return (!key.is_empty()).then(|| key.to_string());
    };

    let segments: Vec<&str> = url.path_segments()?.collect();
    let start = segments
        .windows(3)
        .position(|w| w == ["storage", "v1", "object"])?
        + 3;
    let mut rest = &segments[start..];
    if let Some(first) = rest.first() {
        if matches!(*first, "public" | "sign" | "authenticated") {
            rest = &rest[1..];
        }
    }

    let (named_bucket, key) = rest.split_first()?;
    if *named_bucket != bucket || key.is_empty() {
        return None;
    }
    let key = key.join("/");
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_public_urls() {
        let raw = "https://abc.supabase.co/storage/v1/object/public/project-files/p1/spec.pdf";
        assert_eq!(
            object_key("project-files", raw).as_deref(),
            Some("p1/spec.pdf")
        );
    }

    #[test]
    fn parses_signed_urls_without_query() {
        let raw = "https://abc.supabase.co/storage/v1/object/sign/design-files/d/1.png?token=xyz";
        assert_eq!(object_key("design-files", raw).as_deref(), Some("d/1.png"));
    }

    #[test]
    fn skips_other_buckets() {
        let raw = "https://abc.supabase.co/storage/v1/object/public/brand-files/logo.svg";
        assert_eq!(object_key("design-files", raw), None);
        assert_eq!(object_key("brand-files", raw).as_deref(), Some("logo.svg"));
    }

    #[test]
    fn accepts_bare_keys() {
        assert_eq!(object_key("project-files", "p1/a.txt").as_deref(), Some("p1/a.txt"));
        assert_eq!(
            object_key("project-files", "/project-files/p1/a.txt").as_deref(),
            Some("p1/a.txt")
        );
        assert_eq!(object_key("project-files", "  "), None);
    }

    #[test]
    fn ignores_foreign_urls() {
        assert_eq!(object_key("project-files", "https://example.com/file.pdf"), None);
    }

    #[test]
    fn builds_object_urls() {
        let storage =
            HttpObjectStorage::new("https://abc.supabase.co/", "key", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            storage.object_url("project-files", "p1/a b.txt").unwrap().as_str(),
            "https://abc.supabase.co/storage/v1/object/project-files/p1/a%20b.txt"
        );
    }
}
