use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::erasure::planner::DeletionPlan;
use crate::erasure::types::Target;

/// How bad a partial failure is, most severe last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    /// Some cleanup steps failed; the identity record is gone
    DataDebris,
    /// Execution was cut short by a timeout or crash; resumable
    Interrupted,
    /// The identity record survived; needs manual remediation
    IdentityRetained,
}

/// Planned -> Executing -> {Completed | PartialFailure}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "severity", rename_all = "snake_case")]
pub enum ErasureStatus {
    Planned,
    Executing,
    Completed,
    PartialFailure(FailureSeverity),
}

impl ErasureStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErasureStatus::Completed | ErasureStatus::PartialFailure(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErasureStatus::Planned => "planned",
            ErasureStatus::Executing => "executing",
            ErasureStatus::Completed => "completed",
            ErasureStatus::PartialFailure(_) => "partial_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Deleted,
    /// Nothing matched; counts as success
    AlreadyAbsent,
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StepOutcome::Failed { .. })
    }
}

/// Outcome of one deletion step, appended to the request and never rewritten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub tier: usize,
    pub collection: String,
    pub identity: bool,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub rows_deleted: u64,
    pub objects_deleted: u64,
    pub objects_absent: u64,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureRequest {
    pub id: Uuid,
    pub target: Target,
    pub status: ErasureStatus,
    pub plan: DeletionPlan,
    pub step_results: Vec<StepResult>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ErasureRequest {
    pub fn new(id: Uuid, plan: DeletionPlan, now: DateTime<Utc>) -> Self {
        Self {
            id,
            target: plan.target,
            status: ErasureStatus::Planned,
            plan,
            step_results: Vec::new(),
            created_at: now,
            completed_at: None,
        }
    }

    pub fn step_failure_count(&self) -> usize {
        self.step_results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .count()
    }
}

/// Derive the terminal status from a finished run's step results
pub fn terminal_status(results: &[StepResult]) -> ErasureStatus {
    let identity_failed = results
        .iter()
        .any(|r| r.identity && !r.outcome.is_success());
    let any_failed = results.iter().any(|r| !r.outcome.is_success());

    if identity_failed {
        ErasureStatus::PartialFailure(FailureSeverity::IdentityRetained)
    } else if any_failed {
        ErasureStatus::PartialFailure(FailureSeverity::DataDebris)
    } else {
        ErasureStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(collection: &str, identity: bool, outcome: StepOutcome) -> StepResult {
        StepResult {
            tier: 0,
            collection: collection.into(),
            identity,
            outcome,
            rows_deleted: 0,
            objects_deleted: 0,
            objects_absent: 0,
            finished_at: Utc::now(),
        }
    }

    fn failed() -> StepOutcome {
        StepOutcome::Failed {
            error: "boom".into(),
        }
    }

    #[test]
    fn identity_failure_outranks_debris() {
        let results = vec![
            result("profiles", false, failed()),
            result("auth.users", true, failed()),
        ];
        assert_eq!(
            terminal_status(&results),
            ErasureStatus::PartialFailure(FailureSeverity::IdentityRetained)
        );
    }

    #[test]
    fn debris_with_identity_gone() {
        let results = vec![
            result("profiles", false, failed()),
            result("auth.users", true, StepOutcome::Deleted),
        ];
        assert_eq!(
            terminal_status(&results),
            ErasureStatus::PartialFailure(FailureSeverity::DataDebris)
        );
    }

    #[test]
    fn already_absent_counts_as_success() {
        let results = vec![
            result("profiles", false, StepOutcome::AlreadyAbsent),
            result("auth.users", true, StepOutcome::Deleted),
        ];
        assert_eq!(terminal_status(&results), ErasureStatus::Completed);
    }

    #[test]
    fn status_serializes_with_severity() {
        let value = serde_json::to_value(ErasureStatus::PartialFailure(
            FailureSeverity::IdentityRetained,
        ))
        .unwrap();
        assert_eq!(value["state"], "partial_failure");
        assert_eq!(value["severity"], "identity_retained");

        let value = serde_json::to_value(ErasureStatus::Completed).unwrap();
        assert_eq!(value["state"], "completed");
    }
}
