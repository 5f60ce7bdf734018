use anyhow::{anyhow, Context};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Thin HTTP client for the erasure API
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

/// Decoded response envelope; non-2xx statuses are returned, not raised
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// Error message from a failed envelope, falling back to the status line
    pub fn error_message(&self) -> String {
        self.body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.status.to_string())
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

impl ApiClient {
    pub fn new(server: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base = Url::parse(server).with_context(|| format!("invalid server URL '{}'", server))?;
        // Erasures run synchronously; leave room for the server-side execution timeout
        let http = Client::builder().timeout(Duration::from_secs(15 * 60)).build()?;
        Ok(Self { http, base, token })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).with_context(|| format!("invalid path '{}'", path))
    }

    fn require_token(&self) -> anyhow::Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow!("operator token required; pass --token or set ERASURE_TOKEN"))
    }

    pub async fn get(&self, path: &str, authenticated: bool) -> anyhow::Result<ApiReply> {
        let mut request = self.http.get(self.url(path)?);
        if authenticated {
            request = request.bearer_auth(self.require_token()?);
        }
        Self::decode(request.send().await?).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B, authenticated: bool) -> anyhow::Result<ApiReply> {
        let mut request = self.http.post(self.url(path)?).json(body);
        if authenticated {
            request = request.bearer_auth(self.require_token()?);
        }
        Self::decode(request.send().await?).await
    }

    async fn decode(response: reqwest::Response) -> anyhow::Result<ApiReply> {
        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("server returned non-JSON body ({})", status))?
        };
        Ok(ApiReply { status, body })
    }
}
