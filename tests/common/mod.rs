#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use tenant_erasure::auth::{generate_jwt, Claims};
use tenant_erasure::erasure::audit::NoopNotifier;
use tenant_erasure::erasure::challenge::solve_prompt;
use tenant_erasure::erasure::clock::{Clock, ManualClock};
use tenant_erasure::erasure::memory::{
    MemoryAttemptStore, MemoryAuditSink, MemoryCodeStore, MemoryErasureJournal, MemoryObjectStorage,
    MemoryRecordStore, MemoryTargetLock,
};
use tenant_erasure::erasure::{DependencyPlanner, ErasureBackends, ErasureCoordinator, ErasureSettings};
use tenant_erasure::{app, AppState};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const OPERATOR_ACCESS: &str = "root";

/// Server bound to a free port, backed by in-memory stores
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub records: Arc<MemoryRecordStore>,
    pub objects: Arc<MemoryObjectStorage>,
    pub audit: Arc<MemoryAuditSink>,
    pub clock: ManualClock,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let clock = ManualClock::default();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let records = Arc::new(MemoryRecordStore::new());
        let objects = Arc::new(MemoryObjectStorage::new());
        let audit = Arc::new(MemoryAuditSink::default());

        let backends = ErasureBackends {
            records: records.clone(),
            objects: objects.clone(),
            codes: Arc::new(MemoryCodeStore::new(shared_clock.clone(), chrono::Duration::minutes(30))),
            attempts: Arc::new(MemoryAttemptStore::default()),
            locks: Arc::new(MemoryTargetLock::new(shared_clock.clone())),
            journal: Arc::new(MemoryErasureJournal::default()),
            audit: audit.clone(),
            notifier: Arc::new(NoopNotifier),
            clock: shared_clock,
        };
        let coordinator = ErasureCoordinator::new(backends, DependencyPlanner::builtin()?, ErasureSettings::default());

        let state = AppState {
            coordinator: Arc::new(coordinator),
            jwt_secret: Arc::from(JWT_SECRET),
            operator_access: Arc::from(OPERATOR_ACCESS),
            pool: None,
        };
        let router = app(state, tenant_erasure::config::config());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            base_url,
            client: reqwest::Client::new(),
            records,
            objects,
            audit,
            clock,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn operator_token(&self) -> String {
        token_with_access(OPERATOR_ACCESS)
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let res = request.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let res = request.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    /// Account with one project holding one stored file, plus a consent session
    pub async fn seed_account(&self) -> (Uuid, Uuid) {
        let account = Uuid::new_v4();
        let session = Uuid::new_v4();
        let id = account.to_string();

        self.records.insert("auth.users", json!({"id": id})).await;
        self.records.insert("profiles", json!({"id": "pr1", "user_id": id})).await;
        self.records.insert("client_projects", json!({"id": "p1", "client_id": id})).await;
        self.records
            .insert("project_files", json!({"id": "f1", "project_id": "p1", "file_url": "p1/brief.pdf"}))
            .await;
        self.objects.put("project-files", "p1/brief.pdf").await;
        self.records
            .insert("cookie_consent_logs", json!({"id": 1, "session_id": session.to_string()}))
            .await;

        (account, session)
    }

    /// Fetch a challenge for `fingerprint` and return its correct answer
    pub async fn solve_challenge(&self, fingerprint: &str) -> Result<i64> {
        let (status, body) = self
            .post("/public/erasure/challenge", json!({ "fingerprint": fingerprint }), None)
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "challenge failed: {} {}", status, body);
        let prompt = body["data"]["prompt"].as_str().context("missing prompt")?;
        solve_prompt(prompt).context("unparseable prompt")
    }
}

pub fn token_with_access(access: &str) -> String {
    generate_jwt(&Claims::new("integration", access, 1), JWT_SECRET).expect("token generation")
}
