// Static relationship graph consumed by the planner.
//
// The graph is configuration, not runtime discovery: the built-in copy is
// embedded from relations.yaml and a deployment may point ERASURE_RELATIONS_PATH
// at its own file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::erasure::planner::PlanError;

const BUILTIN_RELATIONS: &str = include_str!("relations.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationGraph {
    pub account: TargetRelations,
    pub session: TargetRelations,
}

/// Everything that references one target variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetRelations {
    #[serde(default)]
    pub identity: Option<IdentitySpec>,
    #[serde(default)]
    pub collections: Vec<CollectionSpec>,
}

/// The authentication record; always erased last
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub collection: String,
    #[serde(default = "default_key")]
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    /// Foreign key scoping rows to the target (directly, or via `parent`)
    pub column: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_key")]
    pub parent_key: String,
    /// Additional foreign keys that only constrain ordering
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub objects: Vec<BucketRef>,
}

/// A column holding pointers into an object-storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketRef {
    pub bucket: String,
    pub column: String,
}

fn default_key() -> String {
    "id".to_string()
}

impl CollectionSpec {
    /// Every collection this one holds a foreign key into
    pub fn foreign_keys(&self) -> impl Iterator<Item = &str> {
        self.parent
            .as_deref()
            .into_iter()
            .chain(self.references.iter().map(String::as_str))
    }
}

impl RelationGraph {
    /// The portal's own schema
    pub fn builtin() -> Result<Self, PlanError> {
        Self::from_yaml(BUILTIN_RELATIONS)
    }

    pub fn from_yaml(text: &str) -> Result<Self, PlanError> {
        serde_yaml::from_str(text).map_err(|e| PlanError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PlanError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&text)
    }

    /// Load from `path` when given, else the built-in graph
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self, PlanError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }
}
