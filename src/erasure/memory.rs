//! In-memory backends for every erasure seam, with fault injection
//! (`fail_on`, `panic_on`, `fail_bucket`, `set_delay`).
//!
//! Test doubles only: the unit tests and the HTTP tests under `tests/` build
//! the coordinator on them. The server always runs on the Postgres and HTTP
//! backends. Each store serialises its own state behind a tokio lock, which
//! gives the same atomicity the Postgres implementations get from single
//! statements.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::erasure::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::erasure::challenge::{AttemptStore, ChallengeAttemptState, PendingChallenge};
use crate::erasure::clock::Clock;
use crate::erasure::codes::{generate_code, hash_code, IssuedCode, VerificationCodeStore};
use crate::erasure::error::StoreError;
use crate::erasure::journal::ErasureJournal;
use crate::erasure::lock::{LockLease, TargetLock};
use crate::erasure::planner::Selector;
use crate::erasure::records::RecordStore;
use crate::erasure::request::{ErasureRequest, ErasureStatus, StepResult};
use crate::erasure::storage::{ObjectStorage, RemoveOutcome, StorageError};

pub type Row = Map<String, Value>;

/// Tables of JSON rows keyed by collection name
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failing: RwLock<HashSet<String>>,
    panicking: RwLock<HashSet<String>>,
    delay: RwLock<Option<std::time::Duration>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row; non-object values are ignored
    pub async fn insert(&self, collection: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables
                .write()
                .await
                .entry(collection.to_string())
                .or_default()
                .push(row);
        }
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.tables
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Every operation on `collection` fails until `heal` is called
    pub async fn fail_on(&self, collection: &str) {
        self.failing.write().await.insert(collection.to_string());
    }

    pub async fn heal(&self, collection: &str) {
        self.failing.write().await.remove(collection);
        self.panicking.write().await.remove(collection);
    }

    /// Deleting from `collection` panics
    pub async fn panic_on(&self, collection: &str) {
        self.panicking.write().await.insert(collection.to_string());
    }

    /// Stall every deletion by `delay`
    pub async fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.write().await = Some(delay);
    }

    async fn check(&self, collection: &str) -> Result<(), StoreError> {
        if self.failing.read().await.contains(collection) {
            return Err(StoreError::Unavailable(format!(
                "simulated failure on {}",
                collection
            )));
        }
        Ok(())
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(tables: &HashMap<String, Vec<Row>>, selector: &Selector, target: &str, row: &Row) -> bool {
    match selector {
        Selector::Direct { column } | Selector::Identity { key: column } => {
            row.get(column).and_then(as_text).as_deref() == Some(target)
        }
        Selector::Via {
            column,
            parent,
            parent_key,
            parent_selector,
        } => {
            let Some(value) = row.get(column).and_then(as_text) else {
                return false;
            };
            tables.get(parent).map_or(false, |parents| {
                parents.iter().any(|p| {
                    p.get(parent_key).and_then(as_text).as_deref() == Some(value.as_str())
                        && matches(tables, parent_selector, target, p)
                })
            })
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn select_values(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
        column: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.check(collection).await?;
        let target = target_id.to_string();
        let tables = self.tables.read().await;
        Ok(tables
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|row| matches(&tables, selector, &target, row))
            .filter_map(|row| row.get(column).and_then(as_text))
            .collect())
    }

    async fn delete_rows(
        &self,
        collection: &str,
        selector: &Selector,
        target_id: Uuid,
    ) -> Result<u64, StoreError> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.read().await.contains(collection) {
            panic!("simulated panic deleting from {}", collection);
        }
        self.check(collection).await?;

        let target = target_id.to_string();
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get(collection) else {
            return Ok(0);
        };
        let keep: Vec<bool> = rows
            .iter()
            .map(|row| !matches(&tables, selector, &target, row))
            .collect();

        let rows = tables.entry(collection.to_string()).or_default();
        let before = rows.len();
        let mut flags = keep.into_iter();
        rows.retain(|_| flags.next().unwrap_or(true));
        Ok((before - rows.len()) as u64)
    }
}

/// Buckets of object keys
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashSet<(String, String)>>,
    failing_buckets: RwLock<HashSet<String>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, bucket: &str, key: &str) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()));
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .await
            .contains(&(bucket.to_string(), key.to_string()))
    }

    pub async fn fail_bucket(&self, bucket: &str) {
        self.failing_buckets.write().await.insert(bucket.to_string());
    }

    pub async fn heal_bucket(&self, bucket: &str) {
        self.failing_buckets.write().await.remove(bucket);
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn remove(&self, bucket: &str, key: &str) -> Result<RemoveOutcome, StorageError> {
        if self.failing_buckets.read().await.contains(bucket) {
            return Err(StorageError::Unavailable(format!("bucket {} is failing", bucket)));
        }
        let removed = self
            .objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(if removed {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        })
    }
}

#[derive(Debug, Clone)]
struct StoredCode {
    target_id: Uuid,
    code_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
    superseded: bool,
}

pub struct MemoryCodeStore {
    codes: Mutex<Vec<StoredCode>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl MemoryCodeStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            codes: Mutex::new(Vec::new()),
            clock,
            ttl,
        }
    }

    pub async fn stored(&self, target_id: Uuid) -> usize {
        self.codes
            .lock()
            .await
            .iter()
            .filter(|c| c.target_id == target_id)
            .count()
    }
}

#[async_trait]
impl VerificationCodeStore for MemoryCodeStore {
    async fn issue(&self, target_id: Uuid) -> Result<IssuedCode, StoreError> {
        let now = self.clock.now();
        let code = generate_code();
        let expires_at = now + self.ttl;

        let mut codes = self.codes.lock().await;
        for existing in codes.iter_mut().filter(|c| c.target_id == target_id && !c.used) {
            existing.superseded = true;
        }
        codes.push(StoredCode {
            target_id,
            code_hash: hash_code(target_id, &code),
            created_at: now,
            expires_at,
            used: false,
            superseded: false,
        });
        Ok(IssuedCode { code, expires_at })
    }

    async fn validate_and_consume(&self, target_id: Uuid, code: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let hash = hash_code(target_id, code);

        let mut codes = self.codes.lock().await;
        let candidate = codes
            .iter_mut()
            .filter(|c| {
                c.target_id == target_id
                    && c.code_hash == hash
                    && !c.used
                    && !c.superseded
                    && c.expires_at >= now
            })
            .max_by_key(|c| c.created_at);

        Ok(match candidate {
            Some(stored) => {
                stored.used = true;
                true
            }
            None => false,
        })
    }

    async fn purge(&self, target_id: Uuid) -> Result<u64, StoreError> {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|c| c.target_id != target_id);
        Ok((before - codes.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    states: Mutex<HashMap<String, ChallengeAttemptState>>,
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn load(&self, fingerprint: &str) -> Result<ChallengeAttemptState, StoreError> {
        Ok(self
            .states
            .lock()
            .await
            .get(fingerprint)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_pending(
        &self,
        fingerprint: &str,
        pending: PendingChallenge,
        _now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.states
            .lock()
            .await
            .entry(fingerprint.to_string())
            .or_default()
            .pending = Some(pending);
        Ok(())
    }

    async fn take_pending(
        &self,
        fingerprint: &str,
        _now: DateTime<Utc>,
    ) -> Result<Option<PendingChallenge>, StoreError> {
        Ok(self
            .states
            .lock()
            .await
            .get_mut(fingerprint)
            .and_then(|state| state.pending.take()))
    }

    async fn record_failure(
        &self,
        fingerprint: &str,
        max_failures: u32,
        lockout_until: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<ChallengeAttemptState, StoreError> {
        let mut states = self.states.lock().await;
        let state = states.entry(fingerprint.to_string()).or_default();
        state.failure_count += 1;
        if state.failure_count >= max_failures {
            state.locked_until = Some(lockout_until);
        }
        Ok(state.clone())
    }

    async fn reset(&self, fingerprint: &str, _now: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(state) = self.states.lock().await.get_mut(fingerprint) {
            state.failure_count = 0;
            state.locked_until = None;
        }
        Ok(())
    }
}

pub struct MemoryTargetLock {
    leases: Mutex<HashMap<String, LockLease>>,
    clock: Arc<dyn Clock>,
}

impl MemoryTargetLock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn is_held(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.leases
            .lock()
            .await
            .get(key)
            .map_or(false, |lease| lease.expires_at > now)
    }
}

#[async_trait]
impl TargetLock for MemoryTargetLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>, StoreError> {
        let now = self.clock.now();
        let mut leases = self.leases.lock().await;
        if leases.get(key).map_or(false, |lease| lease.expires_at > now) {
            return Ok(None);
        }
        let lease = LockLease {
            key: key.to_string(),
            holder: Uuid::new_v4(),
            expires_at: now + ttl,
        };
        leases.insert(key.to_string(), lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &LockLease) -> Result<(), StoreError> {
        let mut leases = self.leases.lock().await;
        if leases.get(&lease.key).map_or(false, |held| held.holder == lease.holder) {
            leases.remove(&lease.key);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryErasureJournal {
    requests: RwLock<HashMap<Uuid, ErasureRequest>>,
}

#[async_trait]
impl ErasureJournal for MemoryErasureJournal {
    async fn create(&self, request: &ErasureRequest) -> Result<(), StoreError> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ErasureStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(request) = self.requests.write().await.get_mut(&id) {
            request.status = status;
            request.completed_at = status.is_terminal().then_some(at);
        }
        Ok(())
    }

    async fn append_step(&self, id: Uuid, result: &StepResult) -> Result<(), StoreError> {
        if let Some(request) = self.requests.write().await.get_mut(&id) {
            request.step_results.push(result.clone());
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<ErasureRequest>, StoreError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn count_of(&self, kind: AuditEventKind) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
