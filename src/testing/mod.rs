use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::erasure::audit::NoopNotifier;
use crate::erasure::clock::ManualClock;
use crate::erasure::coordinator::{ErasureBackends, ErasureCoordinator, ErasureSettings};
use crate::erasure::memory::{
    MemoryAttemptStore, MemoryAuditSink, MemoryCodeStore, MemoryErasureJournal, MemoryObjectStorage,
    MemoryRecordStore, MemoryTargetLock,
};
use crate::erasure::planner::DependencyPlanner;

/// Coordinator wired to in-memory backends, with handles for inspection
pub struct Fixture {
    pub coordinator: ErasureCoordinator,
    pub records: Arc<MemoryRecordStore>,
    pub objects: Arc<MemoryObjectStorage>,
    pub codes: Arc<MemoryCodeStore>,
    pub locks: Arc<MemoryTargetLock>,
    pub journal: Arc<MemoryErasureJournal>,
    pub audit: Arc<MemoryAuditSink>,
    pub clock: ManualClock,
}

/// Identifiers seeded by `Fixture::seed_scenario`
#[derive(Debug, Clone, Copy)]
pub struct ScenarioIds {
    pub account: Uuid,
    pub other_account: Uuid,
    pub session: Uuid,
    pub other_session: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(ErasureSettings::default())
    }

    pub fn with_settings(settings: ErasureSettings) -> Self {
        let clock = ManualClock::default();
        let shared_clock = Arc::new(clock.clone());

        let records = Arc::new(MemoryRecordStore::new());
        let objects = Arc::new(MemoryObjectStorage::new());
        let codes = Arc::new(MemoryCodeStore::new(shared_clock.clone(), Duration::minutes(30)));
        let locks = Arc::new(MemoryTargetLock::new(shared_clock.clone()));
        let journal = Arc::new(MemoryErasureJournal::default());
        let audit = Arc::new(MemoryAuditSink::default());

        let backends = ErasureBackends {
            records: records.clone(),
            objects: objects.clone(),
            codes: codes.clone(),
            attempts: Arc::new(MemoryAttemptStore::default()),
            locks: locks.clone(),
            journal: journal.clone(),
            audit: audit.clone(),
            notifier: Arc::new(NoopNotifier),
            clock: shared_clock,
        };
        let planner = DependencyPlanner::builtin().expect("built-in relationship graph is valid");

        Self {
            coordinator: ErasureCoordinator::new(backends, planner, settings),
            records,
            objects,
            codes,
            locks,
            journal,
            audit,
            clock,
        }
    }

    /// Account with 2 projects, 3 stored files (f1..f3) and 1 ticket with
    /// 2 messages, next to an unrelated account and two consent sessions
    pub async fn seed_scenario(&self) -> ScenarioIds {
        let ids = ScenarioIds {
            account: Uuid::new_v4(),
            other_account: Uuid::new_v4(),
            session: Uuid::new_v4(),
            other_session: Uuid::new_v4(),
        };
        let account = ids.account.to_string();
        let other = ids.other_account.to_string();
        let r = &self.records;

        r.insert("auth.users", json!({"id": account, "email": "client@example.com"})).await;
        r.insert("profiles", json!({"id": "pr1", "user_id": account})).await;
        r.insert("client_projects", json!({"id": "p1", "client_id": account})).await;
        r.insert("client_projects", json!({"id": "p2", "client_id": account})).await;
        r.insert("project_files", json!({"id": "fr1", "project_id": "p1", "file_url": "f1"})).await;
        r.insert("project_files", json!({"id": "fr2", "project_id": "p1", "file_url": "f2"})).await;
        r.insert("project_files", json!({"id": "fr3", "project_id": "p2", "file_url": "f3"})).await;
        r.insert("project_tickets", json!({"id": "t1", "project_id": "p1"})).await;
        r.insert("ticket_messages", json!({"id": "m1", "ticket_id": "t1"})).await;
        r.insert("ticket_messages", json!({"id": "m2", "ticket_id": "t1"})).await;
        for key in ["f1", "f2", "f3"] {
            self.objects.put("project-files", key).await;
        }

        r.insert("auth.users", json!({"id": other, "email": "other@example.com"})).await;
        r.insert("profiles", json!({"id": "pr2", "user_id": other})).await;
        r.insert("client_projects", json!({"id": "p9", "client_id": other})).await;
        r.insert(
            "project_files",
            json!({
                "id": "fr9",
                "project_id": "p9",
                "file_url": "https://portal.example.com/storage/v1/object/public/project-files/other/keep.pdf"
            }),
        )
        .await;
        self.objects.put("project-files", "other/keep.pdf").await;

        r.insert("cookie_consent_logs", json!({"id": 1, "session_id": ids.session.to_string()})).await;
        r.insert("cookie_consent_logs", json!({"id": 2, "session_id": ids.other_session.to_string()})).await;

        ids
    }
}
