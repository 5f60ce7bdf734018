use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::erasure::ErasureCoordinator;
use crate::handlers::{elevated, public};
use crate::middleware::operator_auth_middleware;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ErasureCoordinator>,
    pub jwt_secret: Arc<str>,
    /// `access` claim required on operator tokens
    pub operator_access: Arc<str>,
    /// Reported by /health; absent when running on in-memory backends
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(coordinator: Arc<ErasureCoordinator>, config: &AppConfig) -> Self {
        Self {
            coordinator,
            jwt_secret: Arc::from(config.security.jwt_secret.as_str()),
            operator_access: Arc::from(config.security.operator_access.as_str()),
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_erasure_routes())
        // Operator (root JWT)
        .merge(operator_erasure_routes(state.clone()))
        .with_state(state);

    // Global middleware; tracing is off in production presets
    if config.api.enable_request_logging {
        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
    } else {
        router.layer(cors_layer(config))
    }
}

fn public_erasure_routes() -> Router<AppState> {
    use public::erasure;

    Router::new()
        .route("/public/erasure/challenge", post(erasure::challenge_post))
        .route("/public/erasure/session", post(erasure::session_post))
}

fn operator_erasure_routes(state: AppState) -> Router<AppState> {
    use elevated::erasure;

    Router::new()
        .route("/api/erasure/codes", post(erasure::codes_post))
        .route("/api/erasure/account", post(erasure::account_post))
        .route("/api/erasure/plan/:kind/:id", get(erasure::plan_get))
        .route("/api/erasure/requests/:id", get(erasure::request_get))
        .route("/api/erasure/requests/:id/resume", post(erasure::request_resume))
        .route_layer(from_fn_with_state(state, operator_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }
    if config.security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Tenant Erasure",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "challenge": "POST /public/erasure/challenge (public)",
                "session": "POST /public/erasure/session (public)",
                "codes": "POST /api/erasure/codes (operator)",
                "account": "POST /api/erasure/account (operator)",
                "plan": "GET /api/erasure/plan/:kind/:id (operator)",
                "requests": "GET /api/erasure/requests/:id, POST /api/erasure/requests/:id/resume (operator)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    let Some(pool) = state.pool.as_ref() else {
        return (
            StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "disabled" }
            })),
        );
    };

    match DatabaseManager::health_check(pool).await {
        Ok(_) => (
            StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::response::Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}
