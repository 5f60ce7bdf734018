use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tenant_erasure::config;
use tenant_erasure::database::DatabaseManager;
use tenant_erasure::erasure::audit::{NoopNotifier, Notifier, PgAuditSink, WebhookNotifier};
use tenant_erasure::erasure::challenge::PgAttemptStore;
use tenant_erasure::erasure::clock::{Clock, SystemClock};
use tenant_erasure::erasure::codes::PgVerificationCodeStore;
use tenant_erasure::erasure::journal::PgErasureJournal;
use tenant_erasure::erasure::lock::PgTargetLock;
use tenant_erasure::erasure::records::PgRecordStore;
use tenant_erasure::erasure::relations::RelationGraph;
use tenant_erasure::erasure::storage::HttpObjectStorage;
use tenant_erasure::erasure::{DependencyPlanner, ErasureBackends, ErasureCoordinator, ErasureSettings};
use tenant_erasure::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting tenant erasure service in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set; operator routes cannot authenticate without it");
    }

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    DatabaseManager::ensure_schema(&pool)
        .await
        .context("failed to prepare erasure tables")?;

    let graph = RelationGraph::load_or_builtin(config.erasure.relations_path.as_deref())
        .context("failed to load relationship graph")?;
    let planner = DependencyPlanner::new(&graph).context("relationship graph is not plannable")?;

    let objects = HttpObjectStorage::from_config(&config.storage).context("object storage is not configured")?;

    let notifier: Arc<dyn Notifier> = match config.notification.webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookNotifier::new(url, Duration::from_secs(10))?),
        None => Arc::new(NoopNotifier),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backends = ErasureBackends {
        records: Arc::new(PgRecordStore::new(pool.clone())),
        objects: Arc::new(objects),
        codes: Arc::new(PgVerificationCodeStore::new(
            pool.clone(),
            clock.clone(),
            config.erasure.code_ttl(),
        )),
        attempts: Arc::new(PgAttemptStore::new(pool.clone())),
        locks: Arc::new(PgTargetLock::new(pool.clone(), clock.clone())),
        journal: Arc::new(PgErasureJournal::new(pool.clone())),
        audit: Arc::new(PgAuditSink::new(pool.clone())),
        notifier,
        clock,
    };

    let coordinator = ErasureCoordinator::new(backends, planner, ErasureSettings::from_config(&config.erasure));
    let state = AppState::new(Arc::new(coordinator), config).with_pool(pool);
    let router = app(state, config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("tenant erasure service listening on http://{}", bind_addr);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
