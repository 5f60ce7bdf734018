use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::erasure::clock::Clock;
use crate::erasure::error::{ErasureError, StoreError};

#[derive(Debug, Clone)]
pub struct ChallengeSettings {
    /// Wrong answers before the fingerprint is locked out
    pub max_failures: u32,
    pub lockout: Duration,
    /// How long an issued challenge stays answerable
    pub challenge_ttl: Duration,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lockout: Duration::minutes(5),
            challenge_ttl: Duration::minutes(10),
        }
    }
}

/// The outstanding challenge for a fingerprint; only the answer hash is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub nonce: String,
    pub answer_hash: String,
    pub issued_at: DateTime<Utc>,
}

/// Durable per-fingerprint counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeAttemptState {
    pub failure_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub pending: Option<PendingChallenge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub prompt: String,
    #[serde(skip)]
    pub expected_answer_hash: String,
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Default state for unknown fingerprints
    async fn load(&self, fingerprint: &str) -> Result<ChallengeAttemptState, StoreError>;

    /// Replace any outstanding challenge
    async fn put_pending(
        &self,
        fingerprint: &str,
        pending: PendingChallenge,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Remove and return the outstanding challenge; at most one caller gets it
    async fn take_pending(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingChallenge>, StoreError>;

    /// Increment the failure count, locking until `lockout_until` once it
    /// reaches `max_failures`. Returns the updated state.
    async fn record_failure(
        &self,
        fingerprint: &str,
        max_failures: u32,
        lockout_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeAttemptState, StoreError>;

    /// Zero the failure count and clear any lockout
    async fn reset(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Arithmetic human-verification with progressive lockout
pub struct ChallengeGate {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    settings: ChallengeSettings,
}

impl ChallengeGate {
    pub fn new(store: Arc<dyn AttemptStore>, clock: Arc<dyn Clock>, settings: ChallengeSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Fresh challenge for `fingerprint`; the previous one, if any, stops working
    pub async fn issue_challenge(&self, fingerprint: &str) -> Result<Challenge, ErasureError> {
        let now = self.clock.now();
        let state = self.store.load(fingerprint).await?;
        if let Some(until) = state.locked_until.filter(|until| *until > now) {
            return Err(ErasureError::locked(until - now));
        }

        let (prompt, answer) = generate_arithmetic();
        let nonce = Uuid::new_v4().simple().to_string();
        let answer_hash = hash_answer(&nonce, answer);

        self.store
            .put_pending(
                fingerprint,
                PendingChallenge {
                    nonce,
                    answer_hash: answer_hash.clone(),
                    issued_at: now,
                },
                now,
            )
            .await?;

        Ok(Challenge {
            prompt,
            expected_answer_hash: answer_hash,
        })
    }

    /// `Ok(true)` for a correct answer, `Ok(false)` for a wrong one, `Locked`
    /// while locked out or when this failure triggers the lockout. Missing
    /// and expired challenges count as wrong answers.
    pub async fn submit(&self, fingerprint: &str, answer: &str) -> Result<bool, ErasureError> {
        let now = self.clock.now();
        let state = self.store.load(fingerprint).await?;

        match state.locked_until {
            Some(until) if until > now => return Err(ErasureError::locked(until - now)),
            Some(_) => self.store.reset(fingerprint, now).await?,
            None => {}
        }

        let pending = self.store.take_pending(fingerprint, now).await?;
        let correct = match (&pending, parse_answer(answer)) {
            (Some(p), Some(value)) => {
                now - p.issued_at <= self.settings.challenge_ttl && hash_answer(&p.nonce, value) == p.answer_hash
            }
            _ => false,
        };

        if correct {
            self.store.reset(fingerprint, now).await?;
            return Ok(true);
        }

        let state = self
            .store
            .record_failure(
                fingerprint,
                self.settings.max_failures,
                now + self.settings.lockout,
                now,
            )
            .await?;

        match state.locked_until {
            Some(until) if until > now => {
                info!(failures = state.failure_count, "challenge fingerprint locked out");
                Err(ErasureError::locked(until - now))
            }
            _ => {
                if pending.is_none() {
                    warn!("challenge answer submitted without an outstanding challenge");
                }
                Ok(false)
            }
        }
    }
}

fn generate_arithmetic() -> (String, i64) {
    let mut rng = rand::thread_rng();
    let a: i64 = rng.gen_range(1..=10);
    let b: i64 = rng.gen_range(1..=10);
    match rng.gen_range(0..3) {
        0 => (format!("{} + {} = ?", a, b), a + b),
        1 => (format!("{} - {} = ?", a, b), a - b),
        _ => (format!("{} × {} = ?", a, b), a * b),
    }
}

fn parse_answer(answer: &str) -> Option<i64> {
    answer.trim().parse().ok()
}

pub fn hash_answer(nonce: &str, answer: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(b":");
    hasher.update(answer.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Evaluate a prompt produced by this gate
pub fn solve_prompt(prompt: &str) -> Option<i64> {
    let mut parts = prompt.split_whitespace();
    let a: i64 = parts.next()?.parse().ok()?;
    let op = parts.next()?;
    let b: i64 = parts.next()?.parse().ok()?;
    match op {
        "+" => Some(a + b),
        "-" => Some(a - b),
        "×" => Some(a * b),
        _ => None,
    }
}

pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn load(&self, fingerprint: &str) -> Result<ChallengeAttemptState, StoreError> {
        let row = sqlx::query(
            "SELECT failure_count, locked_until, challenge_nonce, challenge_hash, challenge_issued_at \
             FROM erasure_challenge_attempts WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(ChallengeAttemptState::default());
        };

        let failure_count: i32 = row.try_get("failure_count")?;
        let nonce: Option<String> = row.try_get("challenge_nonce")?;
        let hash: Option<String> = row.try_get("challenge_hash")?;
        let issued_at: Option<DateTime<Utc>> = row.try_get("challenge_issued_at")?;

        let pending = match (nonce, hash, issued_at) {
            (Some(nonce), Some(answer_hash), Some(issued_at)) => Some(PendingChallenge {
                nonce,
                answer_hash,
                issued_at,
            }),
            _ => None,
        };

        Ok(ChallengeAttemptState {
            failure_count: failure_count.max(0) as u32,
            locked_until: row.try_get("locked_until")?,
            pending,
        })
    }

    async fn put_pending(
        &self,
        fingerprint: &str,
        pending: PendingChallenge,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO erasure_challenge_attempts \
             (fingerprint, failure_count, challenge_nonce, challenge_hash, challenge_issued_at, updated_at) \
             VALUES ($1, 0, $2, $3, $4, $5) \
             ON CONFLICT (fingerprint) DO UPDATE \
             SET challenge_nonce = EXCLUDED.challenge_nonce, \
                 challenge_hash = EXCLUDED.challenge_hash, \
                 challenge_issued_at = EXCLUDED.challenge_issued_at, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(fingerprint)
        .bind(pending.nonce)
        .bind(pending.answer_hash)
        .bind(pending.issued_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_pending(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingChallenge>, StoreError> {
        // The subquery reads the pre-update row, so the old values come back
        let row = sqlx::query(
            "UPDATE erasure_challenge_attempts AS a \
             SET challenge_nonce = NULL, challenge_hash = NULL, challenge_issued_at = NULL, updated_at = $2 \
             FROM (SELECT fingerprint, challenge_nonce, challenge_hash, challenge_issued_at \
                   FROM erasure_challenge_attempts WHERE fingerprint = $1 FOR UPDATE) AS old \
             WHERE a.fingerprint = old.fingerprint AND old.challenge_nonce IS NOT NULL \
             RETURNING old.challenge_nonce, old.challenge_hash, old.challenge_issued_at",
        )
        .bind(fingerprint)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PendingChallenge {
            nonce: row.try_get("challenge_nonce")?,
            answer_hash: row.try_get("challenge_hash")?,
            issued_at: row.try_get("challenge_issued_at")?,
        }))
    }

    async fn record_failure(
        &self,
        fingerprint: &str,
        max_failures: u32,
        lockout_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeAttemptState, StoreError> {
        let row = sqlx::query(
            "INSERT INTO erasure_challenge_attempts (fingerprint, failure_count, locked_until, updated_at) \
             VALUES ($1, 1, CASE WHEN 1 >= $2 THEN $3 END, $4) \
             ON CONFLICT (fingerprint) DO UPDATE \
             SET failure_count = erasure_challenge_attempts.failure_count + 1, \
                 locked_until = CASE \
                     WHEN erasure_challenge_attempts.failure_count + 1 >= $2 THEN $3 \
                     ELSE erasure_challenge_attempts.locked_until END, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING failure_count, locked_until",
        )
        .bind(fingerprint)
        .bind(max_failures as i32)
        .bind(lockout_until)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let failure_count: i32 = row.try_get("failure_count")?;
        Ok(ChallengeAttemptState {
            failure_count: failure_count.max(0) as u32,
            locked_until: row.try_get("locked_until")?,
            pending: None,
        })
    }

    async fn reset(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE erasure_challenge_attempts \
             SET failure_count = 0, locked_until = NULL, updated_at = $2 \
             WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
