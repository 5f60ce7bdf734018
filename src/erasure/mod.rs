// Tenant and session data erasure: proof checks, dependency-ordered
// deletion across records and object storage, and the request journal.

pub mod audit;
pub mod challenge;
pub mod clock;
pub mod codes;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod journal;
pub mod lock;
pub mod memory;
pub mod planner;
pub mod records;
pub mod relations;
pub mod request;
pub mod storage;
pub mod types;

pub use coordinator::{ErasureBackends, ErasureCoordinator, ErasureSettings};
pub use error::{ErasureError, StoreError};
pub use planner::{DeletionPlan, DependencyPlanner, PlanError};
pub use request::{ErasureRequest, ErasureStatus, FailureSeverity, StepOutcome, StepResult};
pub use types::{Proof, Target, TargetKind};
