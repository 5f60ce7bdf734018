use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::erasure::clock::Clock;
use crate::erasure::error::StoreError;

/// Proof of holding the per-target execution lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockLease {
    pub key: String,
    pub holder: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// At most one erasure per target at a time. Leases expire so that a
/// crashed worker cannot wedge a target forever.
#[async_trait]
pub trait TargetLock: Send + Sync {
    /// `None` when another live lease holds the key; never waits
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>, StoreError>;

    /// Releases only if `lease` is still the holder
    async fn release(&self, lease: &LockLease) -> Result<(), StoreError>;
}

pub struct PgTargetLock {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgTargetLock {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl TargetLock for PgTargetLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>, StoreError> {
        let now = self.clock.now();
        let holder = Uuid::new_v4();
        let expires_at = now + ttl;

        // Takes over an expired lease; a live one makes the upsert a no-op
        let acquired = sqlx::query(
            "INSERT INTO erasure_locks (target_key, holder, acquired_at, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (target_key) DO UPDATE \
             SET holder = EXCLUDED.holder, \
                 acquired_at = EXCLUDED.acquired_at, \
                 expires_at = EXCLUDED.expires_at \
             WHERE erasure_locks.expires_at <= EXCLUDED.acquired_at",
        )
        .bind(key)
        .bind(holder)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok((acquired == 1).then(|| LockLease {
            key: key.to_string(),
            holder,
            expires_at,
        }))
    }

    async fn release(&self, lease: &LockLease) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM erasure_locks WHERE target_key = $1 AND holder = $2")
            .bind(&lease.key)
            .bind(lease.holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
