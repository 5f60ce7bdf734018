use chrono::Duration;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ErasureConfig;
use crate::erasure::audit::{AuditEvent, AuditSink, Notifier};
use crate::erasure::challenge::{AttemptStore, Challenge, ChallengeGate, ChallengeSettings};
use crate::erasure::clock::Clock;
use crate::erasure::codes::{IssuedCode, VerificationCodeStore};
use crate::erasure::error::ErasureError;
use crate::erasure::executor::{ErasureExecutor, ExecutorSettings};
use crate::erasure::journal::ErasureJournal;
use crate::erasure::lock::{LockLease, TargetLock};
use crate::erasure::planner::{DeletionPlan, DependencyPlanner};
use crate::erasure::records::RecordStore;
use crate::erasure::request::{ErasureRequest, ErasureStatus, FailureSeverity};
use crate::erasure::storage::ObjectStorage;
use crate::erasure::types::{Proof, Target};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Lease length for the per-target lock; see `lease_ttl`
    pub lock_ttl: Duration,
    /// Upper bound for one execution; on expiry the request ends Interrupted
    pub execution_timeout: std::time::Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::minutes(15),
            execution_timeout: std::time::Duration::from_secs(600),
        }
    }
}

/// Time after the execution timeout for journaling, audit and release
const LEASE_MARGIN_SECS: i64 = 60;

impl CoordinatorSettings {
    /// Lease actually requested: `lock_ttl`, raised when needed so a lease
    /// never expires while its run can still be executing.
    pub fn lease_ttl(&self) -> Duration {
        let floor = Duration::seconds(self.execution_timeout.as_secs() as i64 + LEASE_MARGIN_SECS);
        self.lock_ttl.max(floor)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErasureSettings {
    pub challenge: ChallengeSettings,
    pub executor: ExecutorSettings,
    pub coordinator: CoordinatorSettings,
}

impl ErasureSettings {
    pub fn from_config(config: &ErasureConfig) -> Self {
        Self {
            challenge: config.challenge_settings(),
            executor: config.executor_settings(),
            coordinator: config.coordinator_settings(),
        }
    }
}

/// Everything the coordinator talks to
pub struct ErasureBackends {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStorage>,
    pub codes: Arc<dyn VerificationCodeStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub locks: Arc<dyn TargetLock>,
    pub journal: Arc<dyn ErasureJournal>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Entry point for erasure: authorize, lock, plan, execute, report
pub struct ErasureCoordinator {
    gate: ChallengeGate,
    codes: Arc<dyn VerificationCodeStore>,
    planner: DependencyPlanner,
    executor: ErasureExecutor,
    locks: Arc<dyn TargetLock>,
    journal: Arc<dyn ErasureJournal>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
}

impl ErasureCoordinator {
    pub fn new(backends: ErasureBackends, planner: DependencyPlanner, settings: ErasureSettings) -> Self {
        if settings.coordinator.lease_ttl() > settings.coordinator.lock_ttl {
            warn!(
                lock_ttl_secs = settings.coordinator.lock_ttl.num_seconds(),
                lease_ttl_secs = settings.coordinator.lease_ttl().num_seconds(),
                "lock ttl does not cover the execution timeout; raising it"
            );
        }
        let gate = ChallengeGate::new(
            backends.attempts,
            backends.clock.clone(),
            settings.challenge,
        );
        let executor = ErasureExecutor::new(
            backends.records,
            backends.objects,
            backends.journal.clone(),
            backends.clock.clone(),
            settings.executor,
        );
        Self {
            gate,
            codes: backends.codes,
            planner,
            executor,
            locks: backends.locks,
            journal: backends.journal,
            audit: backends.audit,
            notifier: backends.notifier,
            clock: backends.clock,
            settings: settings.coordinator,
        }
    }

    /// Verify `proof`, then erase everything the target owns.
    ///
    /// `Unauthorized`, `Locked` and `AlreadyInProgress` are returned before
    /// any data is touched. Otherwise the returned request is terminal.
    pub async fn request_erasure(&self, target: Target, proof: Proof) -> Result<ErasureRequest, ErasureError> {
        self.authorize(&target, proof).await?;
        let lease = self.acquire(&target).await?;

        let plan = self.planner.plan(&target);
        let request = ErasureRequest::new(Uuid::new_v4(), plan, self.clock.now());
        if let Err(e) = self.journal.create(&request).await {
            self.release(&lease).await;
            return Err(e.into());
        }

        info!(request_id = %request.id, subject = %target, "erasure request accepted");
        Ok(self.execute_under_lease(request, lease).await)
    }

    /// Re-run a request that did not complete; every step is idempotent
    pub async fn resume(&self, request_id: Uuid) -> Result<ErasureRequest, ErasureError> {
        let request = self.request(request_id).await?;
        if request.status == ErasureStatus::Completed {
            info!(request_id = %request_id, "request already completed, nothing to resume");
            return Ok(request);
        }

        let lease = self.acquire(&request.target).await?;
        info!(request_id = %request_id, subject = %request.target, "resuming erasure request");
        Ok(self.execute_under_lease(request, lease).await)
    }

    pub async fn issue_code(&self, account_id: Uuid) -> Result<IssuedCode, ErasureError> {
        let issued = self.codes.issue(account_id).await?;

        let event = AuditEvent::code_issued(Target::tenant(account_id), self.clock.now());
        if let Err(e) = self.audit.record(&event).await {
            warn!(target_id = %account_id, "failed to audit code issuance: {}", e);
        }
        Ok(issued)
    }

    pub async fn issue_challenge(&self, fingerprint: &str) -> Result<Challenge, ErasureError> {
        self.gate.issue_challenge(fingerprint).await
    }

    pub fn preview(&self, target: &Target) -> DeletionPlan {
        self.planner.plan(target)
    }

    pub async fn request(&self, request_id: Uuid) -> Result<ErasureRequest, ErasureError> {
        self.journal
            .load(request_id)
            .await?
            .ok_or_else(|| ErasureError::NotFound(format!("erasure request {}", request_id)))
    }

    async fn authorize(&self, target: &Target, proof: Proof) -> Result<(), ErasureError> {
        let authorized = match (target, proof) {
            (Target::Tenant { account_id }, Proof::Code(code)) => {
                self.codes.validate_and_consume(*account_id, &code).await?
            }
            (Target::Session { .. }, Proof::Challenge { fingerprint, answer }) => {
                self.gate.submit(&fingerprint, &answer).await?
            }
            _ => false,
        };

        if authorized {
            Ok(())
        } else {
            warn!(subject = %target, "erasure proof rejected");
            Err(ErasureError::Unauthorized)
        }
    }

    async fn acquire(&self, target: &Target) -> Result<LockLease, ErasureError> {
        self.locks
            .try_acquire(&target.lock_key(), self.settings.lease_ttl())
            .await?
            .ok_or_else(|| ErasureError::AlreadyInProgress(target.to_string()))
    }

    async fn release(&self, lease: &LockLease) {
        if let Err(e) = self.locks.release(lease).await {
            // The lease expires on its own; a later run can proceed after lock_ttl
            error!(key = %lease.key, "failed to release erasure lock: {}", e);
        }
    }

    /// Drive the request to a terminal status, then release the lease. Panics
    /// and timeouts inside the executor end the request as Interrupted.
    async fn execute_under_lease(&self, mut request: ErasureRequest, lease: LockLease) -> ErasureRequest {
        request.status = ErasureStatus::Executing;
        request.completed_at = None;
        if let Err(e) = self
            .journal
            .set_status(request.id, request.status, self.clock.now())
            .await
        {
            warn!(request_id = %request.id, "failed to journal status: {}", e);
        }

        let run = AssertUnwindSafe(self.executor.execute(request.id, &request.plan)).catch_unwind();
        let status = match timeout(self.settings.execution_timeout, run).await {
            Ok(Ok(report)) => {
                request.step_results.extend(report.step_results);
                report.status
            }
            Ok(Err(_panic)) => {
                error!(request_id = %request.id, "executor panicked; request interrupted");
                self.reload_steps(&mut request).await;
                ErasureStatus::PartialFailure(FailureSeverity::Interrupted)
            }
            Err(_elapsed) => {
                warn!(
                    request_id = %request.id,
                    "execution timed out after {:?}; request interrupted",
                    self.settings.execution_timeout
                );
                self.reload_steps(&mut request).await;
                ErasureStatus::PartialFailure(FailureSeverity::Interrupted)
            }
        };

        let now = self.clock.now();
        request.status = status;
        request.completed_at = Some(now);
        if let Err(e) = self.journal.set_status(request.id, status, now).await {
            error!(request_id = %request.id, "failed to journal terminal status: {}", e);
        }

        self.release(&lease).await;
        self.finish(&request).await;
        request
    }

    /// Audit, notify, and clean up codes once a request is terminal
    async fn finish(&self, request: &ErasureRequest) {
        let event = AuditEvent::terminal(request, self.clock.now());
        if let Err(e) = self.audit.record(&event).await {
            error!(request_id = %request.id, "failed to write audit event: {}", e);
        }

        match request.status {
            ErasureStatus::Completed => info!(request_id = %request.id, "erasure completed"),
            status => warn!(
                request_id = %request.id,
                status = ?status,
                failed_steps = request.step_failure_count(),
                "erasure finished with failures"
            ),
        }

        if let Err(e) = self.notifier.notify(request).await {
            warn!(request_id = %request.id, "completion notice failed: {}", e);
        }

        if let (ErasureStatus::Completed, Target::Tenant { account_id }) = (request.status, request.target) {
            if let Err(e) = self.codes.purge(account_id).await {
                warn!(request_id = %request.id, "failed to purge verification codes: {}", e);
            }
        }
    }

    async fn reload_steps(&self, request: &mut ErasureRequest) {
        match self.journal.load(request.id).await {
            Ok(Some(saved)) => request.step_results = saved.step_results,
            Ok(None) => {}
            Err(e) => warn!(request_id = %request.id, "failed to reload step results: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erasure::audit::AuditEventKind;
    use crate::erasure::challenge::solve_prompt;
    use crate::erasure::request::StepOutcome;
    use crate::testing::{Fixture, ScenarioIds};
    use tokio::join;

    async fn scenario() -> (Fixture, ScenarioIds) {
        let fixture = Fixture::new();
        let ids = fixture.seed_scenario().await;
        (fixture, ids)
    }

    #[tokio::test]
    async fn scenario_account_is_fully_erased() {
        let (fx, ids) = scenario().await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();

        assert_eq!(request.status, ErasureStatus::Completed);
        let deleted = request
            .step_results
            .iter()
            .filter(|r| r.outcome == StepOutcome::Deleted)
            .count();
        assert!(deleted >= 6, "only {} steps deleted data", deleted);
        for key in ["f1", "f2", "f3"] {
            assert!(!fx.objects.contains("project-files", key).await);
        }
        // Whatever remains belongs to the other tenant
        for (table, remaining) in [
            ("client_projects", 1),
            ("project_files", 1),
            ("project_tickets", 0),
            ("ticket_messages", 0),
            ("profiles", 1),
            ("auth.users", 1),
        ] {
            assert_eq!(fx.records.count(table).await, remaining, "{}", table);
        }
        assert!(fx.objects.contains("project-files", "other/keep.pdf").await);

        assert!(!fx.locks.is_held(&Target::tenant(ids.account).lock_key()).await);
        assert_eq!(fx.audit.count_of(AuditEventKind::ErasureCompleted).await, 1);
        assert_eq!(fx.codes.stored(ids.account).await, 0);
    }

    #[tokio::test]
    async fn scenario_tiers_are_ordered() {
        let (fx, ids) = scenario().await;
        let plan = fx.coordinator.preview(&Target::tenant(ids.account));
        let tier = |name: &str| plan.tier_of(name).unwrap();

        for child in ["ticket_messages", "project_files"] {
            for parent in ["project_tickets", "client_projects"] {
                if child == "project_files" && parent == "project_tickets" {
                    continue;
                }
                assert!(tier(child) < tier(parent), "{} before {}", child, parent);
            }
        }
        assert!(tier("client_projects") < tier("auth.users"));
    }

    #[tokio::test]
    async fn resumed_requests_find_everything_already_absent() {
        let (fx, ids) = scenario().await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;
        let first = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();
        let step_count = first.step_results.len();

        // Force a second run over the same plan
        fx.journal
            .set_status(first.id, ErasureStatus::PartialFailure(FailureSeverity::Interrupted), fx.clock.now())
            .await
            .unwrap();
        let second = fx.coordinator.resume(first.id).await.unwrap();

        assert_eq!(second.status, ErasureStatus::Completed);
        assert_eq!(second.step_results.len(), step_count * 2);
        assert!(second.step_results[step_count..]
            .iter()
            .all(|r| r.outcome == StepOutcome::AlreadyAbsent));
    }

    #[tokio::test]
    async fn identity_failure_is_partial_and_audited_once() {
        let (fx, ids) = scenario().await;
        fx.records.fail_on("auth.users").await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();

        assert_eq!(
            request.status,
            ErasureStatus::PartialFailure(FailureSeverity::IdentityRetained)
        );
        assert_eq!(request.step_failure_count(), 1);
        assert_eq!(fx.records.count("client_projects").await, 1);
        assert_eq!(fx.records.count("auth.users").await, 2);
        assert_eq!(fx.audit.count_of(AuditEventKind::IdentityDeletionFailed).await, 1);
        let terminal_events = fx
            .audit
            .events()
            .await
            .into_iter()
            .filter(|e| e.kind != AuditEventKind::CodeIssued)
            .count();
        assert_eq!(terminal_events, 1);
        assert!(!fx.locks.is_held(&Target::tenant(ids.account).lock_key()).await);
    }

    #[tokio::test]
    async fn failed_step_leaves_debris_but_continues() {
        let (fx, ids) = scenario().await;
        fx.records.fail_on("ticket_messages").await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();

        assert_eq!(request.status, ErasureStatus::PartialFailure(FailureSeverity::DataDebris));
        assert_eq!(fx.records.count("ticket_messages").await, 2);
        assert_eq!(fx.records.count("auth.users").await, 1);
        assert_eq!(fx.records.count("project_files").await, 1);
        // Tickets and projects wait for their messages
        assert_eq!(fx.records.count("project_tickets").await, 1);
        assert_eq!(fx.records.count("client_projects").await, 3);
        assert_eq!(fx.audit.count_of(AuditEventKind::ErasurePartialFailure).await, 1);
    }

    #[tokio::test]
    async fn storage_failure_keeps_rows_for_retry() {
        let (fx, ids) = scenario().await;
        fx.objects.fail_bucket("project-files").await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();
        assert_eq!(request.status, ErasureStatus::PartialFailure(FailureSeverity::DataDebris));
        let files = request
            .step_results
            .iter()
            .find(|r| r.collection == "project_files")
            .unwrap();
        assert!(!files.outcome.is_success());
        assert_eq!(files.rows_deleted, 0);
        assert_eq!(fx.records.count("project_files").await, 4);
        // Projects stay so the file rows can still be found through them
        assert_eq!(fx.records.count("client_projects").await, 3);
        for key in ["f1", "f2", "f3"] {
            assert!(fx.objects.contains("project-files", key).await);
        }

        fx.objects.heal_bucket("project-files").await;
        let resumed = fx.coordinator.resume(request.id).await.unwrap();

        assert_eq!(resumed.status, ErasureStatus::Completed);
        for key in ["f1", "f2", "f3"] {
            assert!(!fx.objects.contains("project-files", key).await, "{} survived", key);
        }
        assert_eq!(fx.records.count("project_files").await, 1);
        assert_eq!(fx.records.count("client_projects").await, 1);
        assert!(fx.objects.contains("project-files", "other/keep.pdf").await);
    }

    #[tokio::test]
    async fn bad_codes_never_touch_data() {
        let (fx, ids) = scenario().await;
        let issued = fx.coordinator.issue_code(ids.account).await.unwrap();

        let result = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code("WRONGCODE".into()))
            .await;
        assert!(matches!(result, Err(ErasureError::Unauthorized)));
        assert_eq!(fx.records.count("client_projects").await, 2);

        // A code for one account is useless against another
        let result = fx
            .coordinator
            .request_erasure(Target::tenant(ids.other_account), Proof::Code(issued.code.clone()))
            .await;
        assert!(matches!(result, Err(ErasureError::Unauthorized)));

        // Wrong proof kind for the target
        let result = fx
            .coordinator
            .request_erasure(
                Target::tenant(ids.account),
                Proof::Challenge {
                    fingerprint: "fp".into(),
                    answer: "1".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(ErasureError::Unauthorized)));
        assert!(fx.audit.events().await.iter().all(|e| e.kind == AuditEventKind::CodeIssued));
    }

    #[tokio::test]
    async fn codes_are_single_use() {
        let (fx, ids) = scenario().await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;
        fx.coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code.clone()))
            .await
            .unwrap();
        let again = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await;
        assert!(matches!(again, Err(ErasureError::Unauthorized)));
    }

    #[tokio::test]
    async fn held_lock_rejects_second_request() {
        let (fx, ids) = scenario().await;
        let target = Target::tenant(ids.account);
        let _held = fx
            .locks
            .try_acquire(&target.lock_key(), Duration::minutes(1))
            .await
            .unwrap()
            .unwrap();

        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;
        let result = fx.coordinator.request_erasure(target, Proof::Code(code)).await;
        assert!(matches!(result, Err(ErasureError::AlreadyInProgress(_))));
        assert_eq!(fx.records.count("client_projects").await, 2);
    }

    #[tokio::test]
    async fn simultaneous_requests_run_once() {
        let (fx, ids) = scenario().await;
        fx.records.set_delay(std::time::Duration::from_millis(50)).await;
        let target = Target::session(ids.session);

        let a = fx.coordinator.issue_challenge("fp-a").await.unwrap();
        let b = fx.coordinator.issue_challenge("fp-b").await.unwrap();
        let proof = |fp: &str, prompt: &str| Proof::Challenge {
            fingerprint: fp.into(),
            answer: solve_prompt(prompt).unwrap().to_string(),
        };

        let (first, second) = join!(
            fx.coordinator.request_erasure(target, proof("fp-a", &a.prompt)),
            fx.coordinator.request_erasure(target, proof("fp-b", &b.prompt)),
        );

        let results = [first, second];
        let completed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(ErasureError::AlreadyInProgress(_))))
            .count();
        assert_eq!((completed, rejected), (1, 1));
        assert_eq!(fx.records.count("cookie_consent_logs").await, 1);
    }

    #[tokio::test]
    async fn lease_outlives_the_execution_timeout() {
        let fx = Fixture::with_settings(ErasureSettings {
            coordinator: CoordinatorSettings {
                lock_ttl: Duration::minutes(1),
                execution_timeout: std::time::Duration::from_secs(600),
            },
            ..ErasureSettings::default()
        });
        let ids = fx.seed_scenario().await;
        fx.records.set_delay(std::time::Duration::from_millis(100)).await;
        let target = Target::session(ids.session);

        let a = fx.coordinator.issue_challenge("fp-a").await.unwrap();
        let b = fx.coordinator.issue_challenge("fp-b").await.unwrap();
        let proof = |fp: &str, prompt: &str| Proof::Challenge {
            fingerprint: fp.into(),
            answer: solve_prompt(prompt).unwrap().to_string(),
        };

        // The second caller arrives after lock_ttl has passed, mid-run
        let (first, second) = join!(
            fx.coordinator.request_erasure(target, proof("fp-a", &a.prompt)),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                fx.clock.advance(Duration::minutes(5));
                fx.coordinator.request_erasure(target, proof("fp-b", &b.prompt)).await
            },
        );

        assert_eq!(first.unwrap().status, ErasureStatus::Completed);
        assert!(matches!(second, Err(ErasureError::AlreadyInProgress(_))));
    }

    #[test]
    fn lease_ttl_covers_execution_timeout() {
        let short = CoordinatorSettings {
            lock_ttl: Duration::minutes(1),
            execution_timeout: std::time::Duration::from_secs(600),
        };
        assert_eq!(short.lease_ttl(), Duration::seconds(660));

        let roomy = CoordinatorSettings::default();
        assert_eq!(roomy.lease_ttl(), Duration::minutes(15));
    }

    #[tokio::test]
    async fn session_erasure_requires_solved_challenge() {
        let (fx, ids) = scenario().await;
        let target = Target::session(ids.session);
        let challenge = fx.coordinator.issue_challenge("fp").await.unwrap();

        let wrong = (solve_prompt(&challenge.prompt).unwrap() + 1).to_string();
        let result = fx
            .coordinator
            .request_erasure(
                target,
                Proof::Challenge {
                    fingerprint: "fp".into(),
                    answer: wrong,
                },
            )
            .await;
        assert!(matches!(result, Err(ErasureError::Unauthorized)));

        let challenge = fx.coordinator.issue_challenge("fp").await.unwrap();
        let request = fx
            .coordinator
            .request_erasure(
                target,
                Proof::Challenge {
                    fingerprint: "fp".into(),
                    answer: solve_prompt(&challenge.prompt).unwrap().to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(request.status, ErasureStatus::Completed);
        // Only this session's consent rows are removed; no identity step
        assert_eq!(fx.records.count("cookie_consent_logs").await, 1);
        assert!(request.step_results.iter().all(|r| !r.identity));
        assert_eq!(fx.records.count("auth.users").await, 2);
    }

    #[tokio::test]
    async fn executor_panic_interrupts_and_releases_lock() {
        let (fx, ids) = scenario().await;
        fx.records.panic_on("profiles").await;
        let target = Target::tenant(ids.account);
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx.coordinator.request_erasure(target, Proof::Code(code)).await.unwrap();
        assert_eq!(
            request.status,
            ErasureStatus::PartialFailure(FailureSeverity::Interrupted)
        );
        assert!(!fx.locks.is_held(&target.lock_key()).await);

        fx.records.heal("profiles").await;
        let resumed = fx.coordinator.resume(request.id).await.unwrap();
        assert_eq!(resumed.status, ErasureStatus::Completed);
        assert_eq!(fx.records.count("auth.users").await, 1);
    }

    #[tokio::test]
    async fn execution_timeout_interrupts() {
        let fx = Fixture::with_settings(ErasureSettings {
            coordinator: CoordinatorSettings {
                execution_timeout: std::time::Duration::from_millis(20),
                ..CoordinatorSettings::default()
            },
            ..ErasureSettings::default()
        });
        let ids = fx.seed_scenario().await;
        fx.records.set_delay(std::time::Duration::from_millis(50)).await;
        let code = fx.coordinator.issue_code(ids.account).await.unwrap().code;

        let request = fx
            .coordinator
            .request_erasure(Target::tenant(ids.account), Proof::Code(code))
            .await
            .unwrap();
        assert_eq!(
            request.status,
            ErasureStatus::PartialFailure(FailureSeverity::Interrupted)
        );
        assert!(!fx.locks.is_held(&Target::tenant(ids.account).lock_key()).await);
        assert_eq!(fx.audit.count_of(AuditEventKind::ErasurePartialFailure).await, 1);
    }

    #[tokio::test]
    async fn unknown_requests_are_not_found() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.coordinator.request(Uuid::new_v4()).await,
            Err(ErasureError::NotFound(_))
        ));
        assert!(matches!(
            fx.coordinator.resume(Uuid::new_v4()).await,
            Err(ErasureError::NotFound(_))
        ));
    }
}
