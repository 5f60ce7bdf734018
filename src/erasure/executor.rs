use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::erasure::clock::Clock;
use crate::erasure::error::StoreError;
use crate::erasure::journal::ErasureJournal;
use crate::erasure::planner::{DeletionPlan, DeletionStep};
use crate::erasure::records::RecordStore;
use crate::erasure::request::{terminal_status, ErasureStatus, StepOutcome, StepResult};
use crate::erasure::storage::{object_key, ObjectStorage, RemoveOutcome};

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Upper bound for one step (objects plus rows)
    pub step_timeout: Duration,
    /// Run the steps of a tier concurrently
    pub parallel_steps: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
            parallel_steps: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub status: ErasureStatus,
    pub step_results: Vec<StepResult>,
}

/// Why a single step failed; recorded, never propagated
#[derive(Debug, Error)]
enum StepError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{failed} object(s) could not be removed: {first}")]
    Objects { failed: usize, first: String },
}

#[derive(Debug, Default)]
struct StepCounts {
    rows_deleted: u64,
    objects_deleted: u64,
    objects_absent: u64,
}

/// Walks a deletion plan tier by tier
pub struct ErasureExecutor {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStorage>,
    journal: Arc<dyn ErasureJournal>,
    clock: Arc<dyn Clock>,
    settings: ExecutorSettings,
}

impl ErasureExecutor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStorage>,
        journal: Arc<dyn ErasureJournal>,
        clock: Arc<dyn Clock>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            records,
            objects,
            journal,
            clock,
            settings,
        }
    }

    /// Run every step of the plan. Step failures are recorded and execution
    /// continues; each result is appended to the journal as soon as it is
    /// known. A failed step holds back the collections it points into, so
    /// the rows it kept stay reachable. Safe to call again on a plan that
    /// already ran.
    pub async fn execute(&self, request_id: Uuid, plan: &DeletionPlan) -> ExecutionReport {
        let target_id = plan.target.id();
        let mut step_results = Vec::with_capacity(plan.step_count());
        let mut held_back: HashSet<String> = HashSet::new();

        info!(
            request_id = %request_id,
            subject = %plan.target,
            tiers = plan.tiers.len(),
            steps = plan.step_count(),
            "executing deletion plan"
        );

        for tier in &plan.tiers {
            let held = &held_back;
            let results = if self.settings.parallel_steps {
                join_all(
                    tier.steps
                        .iter()
                        .map(|step| self.run_and_journal(request_id, tier.index, target_id, step, held)),
                )
                .await
            } else {
                let mut results = Vec::with_capacity(tier.steps.len());
                for step in &tier.steps {
                    results.push(
                        self.run_and_journal(request_id, tier.index, target_id, step, held)
                            .await,
                    );
                }
                results
            };

            for (step, result) in tier.steps.iter().zip(&results) {
                if !result.outcome.is_success() {
                    held_back.extend(step.referenced.iter().cloned());
                }
            }
            step_results.extend(results);
        }

        let status = terminal_status(&step_results);
        info!(
            request_id = %request_id,
            status = status.as_str(),
            failed = step_results.iter().filter(|r| !r.outcome.is_success()).count(),
            "deletion plan finished"
        );

        ExecutionReport {
            status,
            step_results,
        }
    }

    async fn run_and_journal(
        &self,
        request_id: Uuid,
        tier: usize,
        target_id: Uuid,
        step: &DeletionStep,
        held_back: &HashSet<String>,
    ) -> StepResult {
        let result = if held_back.contains(&step.collection) {
            warn!(tier, collection = %step.collection, "held back: dependent step failed");
            let outcome = StepOutcome::Failed {
                error: "dependent step failed".to_string(),
            };
            self.result(tier, step, outcome, StepCounts::default())
        } else {
            self.run_step(tier, target_id, step).await
        };

        if let Err(e) = self.journal.append_step(request_id, &result).await {
            warn!(
                request_id = %request_id,
                collection = %result.collection,
                "failed to journal step result: {}", e
            );
        }
        result
    }

    async fn run_step(&self, tier: usize, target_id: Uuid, step: &DeletionStep) -> StepResult {
        let outcome = timeout(self.settings.step_timeout, self.delete_step(target_id, step)).await;

        let (outcome, counts) = match outcome {
            Ok(Ok(counts)) => {
                let outcome = if counts.rows_deleted > 0 || counts.objects_deleted > 0 {
                    StepOutcome::Deleted
                } else {
                    StepOutcome::AlreadyAbsent
                };
                (outcome, counts)
            }
            Ok(Err(e)) => (
                StepOutcome::Failed {
                    error: e.to_string(),
                },
                StepCounts::default(),
            ),
            Err(_elapsed) => (
                StepOutcome::Failed {
                    error: format!("timed out after {:?}", self.settings.step_timeout),
                },
                StepCounts::default(),
            ),
        };

        match &outcome {
            StepOutcome::Failed { error } if step.is_identity() => {
                error!(tier, collection = %step.collection, "identity deletion failed: {}", error);
            }
            StepOutcome::Failed { error } => {
                warn!(tier, collection = %step.collection, "step failed: {}", error);
            }
            _ => {
                debug!(
                    tier,
                    collection = %step.collection,
                    rows = counts.rows_deleted,
                    objects = counts.objects_deleted,
                    "step done"
                );
            }
        }

        self.result(tier, step, outcome, counts)
    }

    fn result(&self, tier: usize, step: &DeletionStep, outcome: StepOutcome, counts: StepCounts) -> StepResult {
        StepResult {
            tier,
            collection: step.collection.clone(),
            identity: step.is_identity(),
            outcome,
            rows_deleted: counts.rows_deleted,
            objects_deleted: counts.objects_deleted,
            objects_absent: counts.objects_absent,
            finished_at: self.clock.now(),
        }
    }

    /// Objects first, then rows. If any object cannot be removed the rows
    /// stay, so a later run can still find the keys.
    async fn delete_step(&self, target_id: Uuid, step: &DeletionStep) -> Result<StepCounts, StepError> {
        let mut counts = StepCounts::default();
        let mut failures = Vec::new();

        for bucket_ref in &step.bucket_refs {
            let values = self
                .records
                .select_values(&step.collection, &step.selector, target_id, &bucket_ref.column)
                .await?;

            for value in values {
                let Some(key) = object_key(&bucket_ref.bucket, &value) else {
                    debug!(
                        collection = %step.collection,
                        bucket = %bucket_ref.bucket,
                        "reference does not point into bucket, skipping"
                    );
                    continue;
                };
                match self.objects.remove(&bucket_ref.bucket, &key).await {
                    Ok(RemoveOutcome::Removed) => counts.objects_deleted += 1,
                    Ok(RemoveOutcome::NotFound) => counts.objects_absent += 1,
                    Err(e) => failures.push(e.to_string()),
                }
            }
        }

        if let Some(first) = failures.first() {
            return Err(StepError::Objects {
                failed: failures.len(),
                first: first.clone(),
            });
        }

        counts.rows_deleted = self
            .records
            .delete_rows(&step.collection, &step.selector, target_id)
            .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erasure::clock::ManualClock;
    use crate::erasure::memory::{MemoryErasureJournal, MemoryObjectStorage, MemoryRecordStore};
    use crate::erasure::planner::DependencyPlanner;
    use crate::erasure::request::{ErasureRequest, FailureSeverity};
    use crate::erasure::types::Target;
    use serde_json::json;

    struct Harness {
        executor: ErasureExecutor,
        records: Arc<MemoryRecordStore>,
        objects: Arc<MemoryObjectStorage>,
        plan: DeletionPlan,
    }

    async fn harness(settings: ExecutorSettings) -> Harness {
        let records = Arc::new(MemoryRecordStore::new());
        let objects = Arc::new(MemoryObjectStorage::new());
        let account = Uuid::new_v4();
        let id = account.to_string();

        records.insert("auth.users", json!({"id": id})).await;
        records.insert("client_projects", json!({"id": "p1", "client_id": id})).await;
        records
            .insert("project_files", json!({"id": "f1", "project_id": "p1", "file_url": "p1/a.png"}))
            .await;
        records.insert("project_tickets", json!({"id": "t1", "project_id": "p1"})).await;
        records.insert("ticket_messages", json!({"id": "m1", "ticket_id": "t1"})).await;
        objects.put("project-files", "p1/a.png").await;

        let executor = ErasureExecutor::new(
            records.clone(),
            objects.clone(),
            Arc::new(MemoryErasureJournal::default()),
            Arc::new(ManualClock::default()),
            settings,
        );
        let plan = DependencyPlanner::builtin().unwrap().plan(&Target::tenant(account));
        Harness {
            executor,
            records,
            objects,
            plan,
        }
    }

    #[tokio::test]
    async fn sequential_mode_erases_everything() {
        let h = harness(ExecutorSettings {
            parallel_steps: false,
            ..ExecutorSettings::default()
        })
        .await;

        let report = h.executor.execute(Uuid::new_v4(), &h.plan).await;

        assert_eq!(report.status, ErasureStatus::Completed);
        assert_eq!(report.step_results.len(), h.plan.step_count());
        for table in ["auth.users", "client_projects", "project_files", "project_tickets", "ticket_messages"] {
            assert_eq!(h.records.count(table).await, 0, "{} left behind", table);
        }
        assert!(!h.objects.contains("project-files", "p1/a.png").await);
    }

    #[tokio::test]
    async fn rerun_finds_nothing_and_still_completes() {
        let h = harness(ExecutorSettings::default()).await;
        h.executor.execute(Uuid::new_v4(), &h.plan).await;

        let again = h.executor.execute(Uuid::new_v4(), &h.plan).await;

        assert_eq!(again.status, ErasureStatus::Completed);
        assert!(again
            .step_results
            .iter()
            .all(|r| r.outcome == StepOutcome::AlreadyAbsent));
    }

    #[tokio::test]
    async fn results_follow_tier_order() {
        let h = harness(ExecutorSettings::default()).await;

        let report = h.executor.execute(Uuid::new_v4(), &h.plan).await;

        let tiers: Vec<usize> = report.step_results.iter().map(|r| r.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
        assert!(report.step_results.last().unwrap().identity);
    }

    #[tokio::test]
    async fn failed_child_holds_back_its_parents() {
        let h = harness(ExecutorSettings::default()).await;
        h.records.fail_on("ticket_messages").await;

        let report = h.executor.execute(Uuid::new_v4(), &h.plan).await;

        assert_eq!(report.status, ErasureStatus::PartialFailure(FailureSeverity::DataDebris));
        // The chain messages -> tickets -> projects stays intact
        assert_eq!(h.records.count("ticket_messages").await, 1);
        assert_eq!(h.records.count("project_tickets").await, 1);
        assert_eq!(h.records.count("client_projects").await, 1);
        // Unrelated branches and the identity are still erased
        assert_eq!(h.records.count("project_files").await, 0);
        assert_eq!(h.records.count("auth.users").await, 0);

        h.records.heal("ticket_messages").await;
        let retry = h.executor.execute(Uuid::new_v4(), &h.plan).await;
        assert_eq!(retry.status, ErasureStatus::Completed);
        for table in ["ticket_messages", "project_tickets", "client_projects"] {
            assert_eq!(h.records.count(table).await, 0, "{} left behind", table);
        }
    }

    #[tokio::test]
    async fn results_are_journaled_as_steps_finish() {
        let h = harness(ExecutorSettings::default()).await;
        let journal = Arc::new(MemoryErasureJournal::default());
        let executor = ErasureExecutor::new(
            h.records.clone(),
            h.objects.clone(),
            journal.clone(),
            Arc::new(ManualClock::default()),
            ExecutorSettings {
                parallel_steps: false,
                ..ExecutorSettings::default()
            },
        );
        let request = ErasureRequest::new(Uuid::new_v4(), h.plan.clone(), chrono::Utc::now());
        journal.create(&request).await.unwrap();
        h.records.set_delay(Duration::from_millis(40)).await;

        // Cut the run short partway through the first tier
        let _ = timeout(Duration::from_millis(100), executor.execute(request.id, &h.plan)).await;

        let saved = journal.load(request.id).await.unwrap().unwrap();
        assert!(!saved.step_results.is_empty());
        assert!(saved.step_results.len() < h.plan.tiers[0].steps.len());
    }
}
