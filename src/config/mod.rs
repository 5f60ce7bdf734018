use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::erasure::challenge::ChallengeSettings;
use crate::erasure::coordinator::CoordinatorSettings;
use crate::erasure::executor::ExecutorSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub erasure: ErasureConfig,
    pub storage: StorageConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Access level an operator token must carry to reach /api/erasure/*
    pub operator_access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureConfig {
    pub code_ttl_secs: u64,
    pub challenge_max_failures: u32,
    pub challenge_lockout_secs: u64,
    pub challenge_ttl_secs: u64,
    pub lock_ttl_secs: u64,
    pub execution_timeout_secs: u64,
    pub step_timeout_secs: u64,
    pub parallel_steps: bool,
    pub relations_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_url: Option<String>,
    pub service_key: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("ERASURE_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_OPERATOR_ACCESS") {
            self.security.operator_access = v;
        }

        // Erasure overrides
        if let Ok(v) = env::var("ERASURE_CODE_TTL_SECS") {
            self.erasure.code_ttl_secs = v.parse().unwrap_or(self.erasure.code_ttl_secs);
        }
        if let Ok(v) = env::var("ERASURE_CHALLENGE_MAX_FAILURES") {
            self.erasure.challenge_max_failures = v.parse().unwrap_or(self.erasure.challenge_max_failures);
        }
        if let Ok(v) = env::var("ERASURE_CHALLENGE_LOCKOUT_SECS") {
            self.erasure.challenge_lockout_secs = v.parse().unwrap_or(self.erasure.challenge_lockout_secs);
        }
        if let Ok(v) = env::var("ERASURE_CHALLENGE_TTL_SECS") {
            self.erasure.challenge_ttl_secs = v.parse().unwrap_or(self.erasure.challenge_ttl_secs);
        }
        if let Ok(v) = env::var("ERASURE_LOCK_TTL_SECS") {
            self.erasure.lock_ttl_secs = v.parse().unwrap_or(self.erasure.lock_ttl_secs);
        }
        if let Ok(v) = env::var("ERASURE_EXECUTION_TIMEOUT_SECS") {
            self.erasure.execution_timeout_secs = v.parse().unwrap_or(self.erasure.execution_timeout_secs);
        }
        if let Ok(v) = env::var("ERASURE_STEP_TIMEOUT_SECS") {
            self.erasure.step_timeout_secs = v.parse().unwrap_or(self.erasure.step_timeout_secs);
        }
        if let Ok(v) = env::var("ERASURE_PARALLEL_STEPS") {
            self.erasure.parallel_steps = v.parse().unwrap_or(self.erasure.parallel_steps);
        }
        if let Ok(v) = env::var("ERASURE_RELATIONS_PATH") {
            self.erasure.relations_path = Some(v);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_BASE_URL") {
            self.storage.base_url = Some(v);
        }
        if let Ok(v) = env::var("STORAGE_SERVICE_KEY") {
            self.storage.service_key = Some(v);
        }
        if let Ok(v) = env::var("STORAGE_REQUEST_TIMEOUT_SECS") {
            self.storage.request_timeout_secs = v.parse().unwrap_or(self.storage.request_timeout_secs);
        }

        // Notification overrides
        if let Ok(v) = env::var("NOTIFICATION_WEBHOOK_URL") {
            self.notification.webhook_url = Some(v);
        }

        self
    }

    fn erasure_defaults() -> ErasureConfig {
        ErasureConfig {
            code_ttl_secs: 30 * 60,
            challenge_max_failures: 5,
            challenge_lockout_secs: 5 * 60,
            challenge_ttl_secs: 10 * 60,
            lock_ttl_secs: 15 * 60,
            execution_timeout_secs: 10 * 60,
            step_timeout_secs: 60,
            parallel_steps: true,
            relations_path: None,
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string(), "http://localhost:8080".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                operator_access: "root".to_string(),
            },
            erasure: Self::erasure_defaults(),
            storage: StorageConfig {
                base_url: None,
                service_key: None,
                request_timeout_secs: 30,
            },
            notification: NotificationConfig { webhook_url: None },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                operator_access: "root".to_string(),
            },
            erasure: Self::erasure_defaults(),
            storage: StorageConfig {
                base_url: None,
                service_key: None,
                request_timeout_secs: 15,
            },
            notification: NotificationConfig { webhook_url: None },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 1,
                operator_access: "root".to_string(),
            },
            erasure: ErasureConfig {
                parallel_steps: false,
                ..Self::erasure_defaults()
            },
            storage: StorageConfig {
                base_url: None,
                service_key: None,
                request_timeout_secs: 10,
            },
            notification: NotificationConfig { webhook_url: None },
        }
    }
}

impl ErasureConfig {
    pub fn challenge_settings(&self) -> ChallengeSettings {
        ChallengeSettings {
            max_failures: self.challenge_max_failures,
            lockout: chrono::Duration::seconds(self.challenge_lockout_secs as i64),
            challenge_ttl: chrono::Duration::seconds(self.challenge_ttl_secs as i64),
        }
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.code_ttl_secs as i64)
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            step_timeout: Duration::from_secs(self.step_timeout_secs),
            parallel_steps: self.parallel_steps,
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            lock_ttl: chrono::Duration::seconds(self.lock_ttl_secs as i64),
            execution_timeout: Duration::from_secs(self.execution_timeout_secs),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
