use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The account or anonymous session whose data is being erased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Authenticated client account; cascades through everything it owns
    Tenant { account_id: Uuid },
    /// Anonymous consent/browsing session; consent-log rows only
    Session { session_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Tenant,
    Session,
}

impl Target {
    pub fn tenant(account_id: Uuid) -> Self {
        Target::Tenant { account_id }
    }

    pub fn session(session_id: Uuid) -> Self {
        Target::Session { session_id }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Target::Tenant { account_id } => *account_id,
            Target::Session { session_id } => *session_id,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Tenant { .. } => TargetKind::Tenant,
            Target::Session { .. } => TargetKind::Session,
        }
    }

    /// Key used for the per-target execution lock
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.kind().as_str(), self.id())
    }

    pub fn from_parts(kind: TargetKind, id: Uuid) -> Self {
        match kind {
            TargetKind::Tenant => Target::tenant(id),
            TargetKind::Session => Target::session(id),
        }
    }
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Tenant => "account",
            TargetKind::Session => "session",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "account" | "tenant" => Some(TargetKind::Tenant),
            "session" => Some(TargetKind::Session),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lock_key())
    }
}

/// Evidence of control over a target, checked before anything is touched
#[derive(Debug, Clone)]
pub enum Proof {
    /// Single-use verification code for a tenant target
    Code(String),
    /// Answer to the challenge previously issued to `fingerprint`
    Challenge { fingerprint: String, answer: String },
}

/// Session ids are browser-generated v4 UUIDs
pub fn parse_session_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim())
        .ok()
        .filter(|id| id.get_version_num() == 4)
}

pub fn parse_account_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}
