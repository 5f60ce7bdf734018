use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::erasure::error::StoreError;
use crate::erasure::planner::DeletionPlan;
use crate::erasure::request::{ErasureRequest, ErasureStatus, StepResult};
use crate::erasure::types::{Target, TargetKind};

/// Durable record of every erasure request and its step results.
/// Step results are append-only.
#[async_trait]
pub trait ErasureJournal: Send + Sync {
    async fn create(&self, request: &ErasureRequest) -> Result<(), StoreError>;

    /// Terminal statuses stamp `completed_at`; any other status clears it
    async fn set_status(
        &self,
        id: Uuid,
        status: ErasureStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn append_step(&self, id: Uuid, result: &StepResult) -> Result<(), StoreError>;

    async fn load(&self, id: Uuid) -> Result<Option<ErasureRequest>, StoreError>;
}

pub struct PgErasureJournal {
    pool: PgPool,
}

impl PgErasureJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ErasureJournal for PgErasureJournal {
    async fn create(&self, request: &ErasureRequest) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO erasure_requests \
             (id, target_kind, target_id, status, plan, created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7)",
        )
        .bind(request.id)
        .bind(request.target.kind().as_str())
        .bind(request.target.id())
        .bind(serde_json::to_value(request.status)?)
        .bind(serde_json::to_value(&request.plan)?)
        .bind(request.created_at)
        .bind(request.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ErasureStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let completed_at = status.is_terminal().then_some(at);
        sqlx::query(
            "UPDATE erasure_requests \
             SET status = $2, updated_at = $3, completed_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(serde_json::to_value(status)?)
        .bind(at)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_step(&self, id: Uuid, result: &StepResult) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO erasure_step_results (request_id, result, recorded_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(serde_json::to_value(result)?)
            .bind(result.finished_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<ErasureRequest>, StoreError> {
        let Some(row) = sqlx::query(
            "SELECT target_kind, target_id, status, plan, created_at, completed_at \
             FROM erasure_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let kind: String = row.try_get("target_kind")?;
        let kind = TargetKind::parse(&kind)
            .ok_or_else(|| StoreError::Unavailable(format!("unknown target kind '{}'", kind)))?;
        let target = Target::from_parts(kind, row.try_get("target_id")?);
        let status: ErasureStatus = serde_json::from_value(row.try_get("status")?)?;
        let plan: DeletionPlan = serde_json::from_value(row.try_get("plan")?)?;

        let step_rows: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT result FROM erasure_step_results WHERE request_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let step_results = step_rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StepResult>, _>>()?;

        Ok(Some(ErasureRequest {
            id,
            target,
            status,
            plan,
            step_results,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        }))
    }
}
