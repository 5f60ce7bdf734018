use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::database::DatabaseManager;
use crate::erasure::relations::{BucketRef, RelationGraph, TargetRelations};
use crate::erasure::types::{Target, TargetKind};

/// A malformed relationship graph. These are programming errors surfaced at
/// construction time; planning itself never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("relationship graph is not valid YAML: {0}")]
    Parse(String),

    #[error("cannot read relationship graph {path}: {message}")]
    Io { path: String, message: String },

    #[error("{kind}: duplicate collection '{collection}'")]
    Duplicate { kind: &'static str, collection: String },

    #[error("{kind}: '{collection}' references unknown collection '{missing}'")]
    UnknownCollection {
        kind: &'static str,
        collection: String,
        missing: String,
    },

    #[error("{kind}: '{collection}' references itself")]
    SelfReference { kind: &'static str, collection: String },

    #[error("{kind}: reference cycle through '{collection}'")]
    Cycle { kind: &'static str, collection: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}

/// How rows of a collection are scoped to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    /// `column = target_id`
    Direct { column: String },
    /// `column IN (SELECT parent_key FROM parent WHERE <parent_selector>)`
    Via {
        column: String,
        parent: String,
        parent_key: String,
        parent_selector: Box<Selector>,
    },
    /// The identity record, `key = target_id`
    Identity { key: String },
}

/// One unit of deletion work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionStep {
    pub collection: String,
    pub selector: Selector,
    #[serde(default)]
    pub bucket_refs: Vec<BucketRef>,
    /// Collections this one holds foreign keys into. They are held back
    /// when this step fails so its rows stay reachable for a retry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced: Vec<String>,
}

impl DeletionStep {
    pub fn is_identity(&self) -> bool {
        matches!(self.selector, Selector::Identity { .. })
    }
}

/// Steps that may run in any order, after every earlier tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub index: usize,
    pub steps: Vec<DeletionStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub target: Target,
    pub tiers: Vec<Tier>,
}

impl DeletionPlan {
    pub fn steps(&self) -> impl Iterator<Item = (usize, &DeletionStep)> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.steps.iter().map(move |step| (tier.index, step)))
    }

    pub fn step_count(&self) -> usize {
        self.tiers.iter().map(|t| t.steps.len()).sum()
    }

    pub fn tier_of(&self, collection: &str) -> Option<usize> {
        self.steps()
            .find(|(_, step)| step.collection == collection)
            .map(|(tier, _)| tier)
    }
}

/// Tiered steps for one target variant, computed once from the graph
#[derive(Debug, Clone)]
struct CompiledPlan {
    tiers: Vec<Vec<DeletionStep>>,
}

/// Turns the static relationship graph into ordered deletion plans
#[derive(Debug, Clone)]
pub struct DependencyPlanner {
    account: CompiledPlan,
    session: CompiledPlan,
}

impl DependencyPlanner {
    /// Validate the graph and precompute tiers for both target variants
    pub fn new(graph: &RelationGraph) -> Result<Self, PlanError> {
        Ok(Self {
            account: compile("account", &graph.account)?,
            session: compile("session", &graph.session)?,
        })
    }

    pub fn builtin() -> Result<Self, PlanError> {
        Self::new(&RelationGraph::builtin()?)
    }

    /// Pure and deterministic: performs no I/O
    pub fn plan(&self, target: &Target) -> DeletionPlan {
        let compiled = match target.kind() {
            TargetKind::Tenant => &self.account,
            TargetKind::Session => &self.session,
        };
        DeletionPlan {
            target: *target,
            tiers: compiled
                .tiers
                .iter()
                .enumerate()
                .map(|(index, steps)| Tier {
                    index,
                    steps: steps.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done(usize),
}

fn compile(kind: &'static str, relations: &TargetRelations) -> Result<CompiledPlan, PlanError> {
    let mut by_name = HashMap::new();
    for (index, spec) in relations.collections.iter().enumerate() {
        check_identifier(&spec.name)?;
        check_identifier(&spec.column)?;
        check_identifier(&spec.parent_key)?;
        for object in &spec.objects {
            check_identifier(&object.column)?;
        }
        if by_name.insert(spec.name.as_str(), index).is_some() {
            return Err(PlanError::Duplicate {
                kind,
                collection: spec.name.clone(),
            });
        }
    }
    if let Some(identity) = &relations.identity {
        check_identifier(&identity.collection)?;
        check_identifier(&identity.key)?;
        if by_name.contains_key(identity.collection.as_str()) {
            return Err(PlanError::Duplicate {
                kind,
                collection: identity.collection.clone(),
            });
        }
    }

    // referrers[x] = collections holding a foreign key into x
    let mut referrers: Vec<Vec<usize>> = vec![Vec::new(); relations.collections.len()];
    for (index, spec) in relations.collections.iter().enumerate() {
        for fk in spec.foreign_keys() {
            if fk == spec.name {
                return Err(PlanError::SelfReference {
                    kind,
                    collection: spec.name.clone(),
                });
            }
            let target = *by_name.get(fk).ok_or_else(|| PlanError::UnknownCollection {
                kind,
                collection: spec.name.clone(),
                missing: fk.to_string(),
            })?;
            referrers[target].push(index);
        }
    }

    let mut visits: Vec<Option<Visit>> = vec![None; relations.collections.len()];
    for index in 0..relations.collections.len() {
        tier_of(kind, index, relations, &referrers, &mut visits)?;
    }

    let mut tiers: Vec<Vec<DeletionStep>> = Vec::new();
    for (index, spec) in relations.collections.iter().enumerate() {
        let tier = match visits[index] {
            Some(Visit::Done(tier)) => tier,
            _ => unreachable!("every collection visited above"),
        };
        if tiers.len() <= tier {
            tiers.resize_with(tier + 1, Vec::new);
        }
        tiers[tier].push(DeletionStep {
            collection: spec.name.clone(),
            selector: selector_for(index, relations, &by_name),
            bucket_refs: spec.objects.clone(),
            referenced: spec.foreign_keys().map(String::from).collect(),
        });
    }
    for steps in &mut tiers {
        steps.sort_by(|a, b| a.collection.cmp(&b.collection));
    }

    // The identity record always stands alone in the final tier
    if let Some(identity) = &relations.identity {
        tiers.push(vec![DeletionStep {
            collection: identity.collection.clone(),
            selector: Selector::Identity {
                key: identity.key.clone(),
            },
            bucket_refs: Vec::new(),
            referenced: Vec::new(),
        }]);
    }

    Ok(CompiledPlan { tiers })
}

/// tier(x) = 0 when nothing references x, else 1 + the deepest referrer
fn tier_of(
    kind: &'static str,
    index: usize,
    relations: &TargetRelations,
    referrers: &[Vec<usize>],
    visits: &mut [Option<Visit>],
) -> Result<usize, PlanError> {
    match visits[index] {
        Some(Visit::Done(tier)) => return Ok(tier),
        Some(Visit::InProgress) => {
            return Err(PlanError::Cycle {
                kind,
                collection: relations.collections[index].name.clone(),
            })
        }
        None => {}
    }
    visits[index] = Some(Visit::InProgress);

    let mut tier = 0;
    for &referrer in &referrers[index] {
        tier = tier.max(tier_of(kind, referrer, relations, referrers, visits)? + 1);
    }

    visits[index] = Some(Visit::Done(tier));
    Ok(tier)
}

fn selector_for(index: usize, relations: &TargetRelations, by_name: &HashMap<&str, usize>) -> Selector {
    let spec = &relations.collections[index];
    match spec.parent.as_deref().and_then(|p| by_name.get(p)) {
        None => Selector::Direct {
            column: spec.column.clone(),
        },
        Some(&parent) => Selector::Via {
            column: spec.column.clone(),
            parent: relations.collections[parent].name.clone(),
            parent_key: spec.parent_key.clone(),
            parent_selector: Box::new(selector_for(parent, relations, by_name)),
        },
    }
}

fn check_identifier(name: &str) -> Result<(), PlanError> {
    if DatabaseManager::is_valid_identifier(name) {
        Ok(())
    } else {
        Err(PlanError::InvalidIdentifier(name.to_string()))
    }
}
