use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::erasure::error::StoreError;
use crate::erasure::request::{ErasureRequest, ErasureStatus, FailureSeverity};
use crate::erasure::types::{Target, TargetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A verification code was issued (request-issued boundary)
    CodeIssued,
    ErasureCompleted,
    ErasurePartialFailure,
    /// Partial failure where the identity record survived
    IdentityDeletionFailed,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::CodeIssued => "erasure_code_issued",
            AuditEventKind::ErasureCompleted => "erasure_completed",
            AuditEventKind::ErasurePartialFailure => "erasure_partial_failure",
            AuditEventKind::IdentityDeletionFailed => "erasure_identity_deletion_failed",
        }
    }

    pub fn for_status(status: ErasureStatus) -> Self {
        match status {
            ErasureStatus::PartialFailure(FailureSeverity::IdentityRetained) => {
                AuditEventKind::IdentityDeletionFailed
            }
            ErasureStatus::PartialFailure(_) => AuditEventKind::ErasurePartialFailure,
            _ => AuditEventKind::ErasureCompleted,
        }
    }
}

/// One write-only compliance record. Never carries codes or answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub target_id: Uuid,
    pub target_kind: TargetKind,
    pub request_id: Option<Uuid>,
    pub status: Option<ErasureStatus>,
    pub step_failure_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn code_issued(target: Target, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: AuditEventKind::CodeIssued,
            target_id: target.id(),
            target_kind: target.kind(),
            request_id: None,
            status: None,
            step_failure_count: 0,
            timestamp,
        }
    }

    pub fn terminal(request: &ErasureRequest, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: AuditEventKind::for_status(request.status),
            target_id: request.target.id(),
            target_kind: request.target.kind(),
            request_id: Some(request.id),
            status: Some(request.status),
            step_failure_count: request.step_failure_count(),
            timestamp,
        }
    }

    fn description(&self) -> String {
        match self.kind {
            AuditEventKind::CodeIssued => "Erasure verification code issued".to_string(),
            AuditEventKind::ErasureCompleted => "Data erasure completed".to_string(),
            AuditEventKind::ErasurePartialFailure => format!(
                "Data erasure finished with {} failed step(s)",
                self.step_failure_count
            ),
            AuditEventKind::IdentityDeletionFailed => {
                "Data erasure failed to remove the identity record".to_string()
            }
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), StoreError>;
}

/// Emits events on the `audit` tracing target
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), StoreError> {
        info!(
            target: "audit",
            kind = event.kind.as_str(),
            target_id = %event.target_id,
            target_kind = event.target_kind.as_str(),
            request_id = ?event.request_id,
            step_failure_count = event.step_failure_count,
            timestamp = %event.timestamp,
            "{}",
            event.description()
        );
        Ok(())
    }
}

/// Writes into the portal's `action_logs` table and mirrors to tracing
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), StoreError> {
        TracingAuditSink.record(event).await?;

        sqlx::query(
            "INSERT INTO action_logs \
             (action_type, entity_type, entity_id, description, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.kind.as_str())
        .bind(event.target_kind.as_str())
        .bind(event.target_id)
        .bind(event.description())
        .bind(serde_json::to_value(event)?)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Best-effort completion notice. Failures are logged by the caller and
/// never change the request's status.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, request: &ErasureRequest) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, request: &ErasureRequest) -> anyhow::Result<()> {
        debug!(request_id = %request.id, "no notifier configured");
        Ok(())
    }
}

/// POSTs a small JSON summary to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    request_id: Uuid,
    target_kind: &'static str,
    target_id: Uuid,
    status: &'a ErasureStatus,
    step_failure_count: usize,
    completed_at: Option<DateTime<Utc>>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, request: &ErasureRequest) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            event: AuditEventKind::for_status(request.status).as_str(),
            request_id: request.id,
            target_kind: request.target.kind().as_str(),
            target_id: request.target.id(),
            status: &request.status,
            step_failure_count: request.step_failure_count(),
            completed_at: request.completed_at,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_failure_has_its_own_kind() {
        assert_eq!(
            AuditEventKind::for_status(ErasureStatus::PartialFailure(
                FailureSeverity::IdentityRetained
            )),
            AuditEventKind::IdentityDeletionFailed
        );
        assert_eq!(
            AuditEventKind::for_status(ErasureStatus::PartialFailure(FailureSeverity::DataDebris)),
            AuditEventKind::ErasurePartialFailure
        );
        assert_eq!(
            AuditEventKind::for_status(ErasureStatus::Completed),
            AuditEventKind::ErasureCompleted
        );
    }
}
