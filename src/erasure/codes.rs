use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::erasure::clock::Clock;
use crate::erasure::error::StoreError;

/// Unambiguous characters only (no 0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 12;

/// A freshly issued code. The plain code leaves the store exactly once,
/// here; only its hash is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Single-use, time-limited codes authorizing erasure of a tenant
#[async_trait]
pub trait VerificationCodeStore: Send + Sync {
    /// Issue a new code, superseding any earlier unused code for the target
    async fn issue(&self, target_id: Uuid) -> Result<IssuedCode, StoreError>;

    /// True exactly once for a matching, unused, unsuperseded, unexpired
    /// code. Wrong, expired and reused codes are indistinguishable.
    async fn validate_and_consume(&self, target_id: Uuid, code: &str) -> Result<bool, StoreError>;

    /// Drop every stored code for the target
    async fn purge(&self, target_id: Uuid) -> Result<u64, StoreError>;
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Case, whitespace and dashes are not significant
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Hash bound to the target so a code is useless against any other account
pub fn hash_code(target_id: Uuid, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target_id.as_bytes());
    hasher.update(b":");
    hasher.update(normalize_code(code).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct PgVerificationCodeStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PgVerificationCodeStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { pool, clock, ttl }
    }
}

#[async_trait]
impl VerificationCodeStore for PgVerificationCodeStore {
    async fn issue(&self, target_id: Uuid) -> Result<IssuedCode, StoreError> {
        let now = self.clock.now();
        let code = generate_code();
        let expires_at = now + self.ttl;

        let mut tx = self.pool.begin().await?;
        let superseded = sqlx::query(
            "UPDATE erasure_verification_codes SET superseded_at = $2 \
             WHERE target_id = $1 AND used = FALSE AND superseded_at IS NULL",
        )
        .bind(target_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "INSERT INTO erasure_verification_codes \
             (id, target_id, code_hash, created_at, expires_at, used) \
             VALUES ($1, $2, $3, $4, $5, FALSE)",
        )
        .bind(Uuid::new_v4())
        .bind(target_id)
        .bind(hash_code(target_id, &code))
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(target_id = %target_id, superseded, "issued verification code");
        Ok(IssuedCode { code, expires_at })
    }

    async fn validate_and_consume(&self, target_id: Uuid, code: &str) -> Result<bool, StoreError> {
        // Row lock + SKIP LOCKED: of two concurrent consumers only one sees the row
        let consumed = sqlx::query(
            "UPDATE erasure_verification_codes SET used = TRUE \
             WHERE id = ( \
                 SELECT id FROM erasure_verification_codes \
                 WHERE target_id = $1 AND code_hash = $2 \
                   AND used = FALSE AND superseded_at IS NULL AND expires_at >= $3 \
                 ORDER BY created_at DESC LIMIT 1 \
                 FOR UPDATE SKIP LOCKED) \
             AND used = FALSE",
        )
        .bind(target_id)
        .bind(hash_code(target_id, code))
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(consumed == 1)
    }

    async fn purge(&self, target_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM erasure_verification_codes WHERE target_id = $1")
            .bind(target_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
