//! The IntermediateModel (IM): the single, version-independent
//! representation every schema parser produces and the engine consumes.

use kernel::{MergeStrategy, Mrn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named value attached to a principal/role/group/resource/operation,
/// merged into the evaluator input under a merge strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: serde_json::Value,
    /// `None` means "use the domain default" at merge time.
    pub merge: Option<MergeStrategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub mrn: Mrn,
    pub name: String,
    pub description: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub mrn: Mrn,
    pub name: String,
    pub policy_mrn: Mrn,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub mrn: Mrn,
    pub name: String,
    pub role_mrns: Vec<Mrn>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRule {
    pub name: String,
    pub selectors: Vec<String>,
    pub group_mrn: Option<Mrn>,
    pub policy_mrn: Option<Mrn>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub mrn: Mrn,
    pub name: String,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRule {
    pub name: String,
    pub selectors: Vec<String>,
    pub policy_mrn: Mrn,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDefaults {
    pub merge_strategy: MergeStrategy,
}

impl Default for AnnotationDefaults {
    fn default() -> Self {
        AnnotationDefaults {
            merge_strategy: MergeStrategy::Replace,
        }
    }
}

/// Version-independent representation of a PolicyDomain document. Built
/// once by the loader and held immutably for the lifetime of the engine
/// — reload requires constructing a new one and swapping
/// the engine that wraps it, never mutating this value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateModel {
    pub name: String,
    pub annotation_defaults: AnnotationDefaults,
    pub policies: BTreeMap<Mrn, Policy>,
    pub roles: BTreeMap<Mrn, Role>,
    pub groups: BTreeMap<Mrn, Group>,
    pub resources: Vec<ResourceRule>,
    pub resource_groups: BTreeMap<Mrn, ResourceGroup>,
    pub operations: Vec<OperationRule>,
}

impl IntermediateModel {
    /// Verifies that every policy/role/group MRN referenced by another
    /// entity resolves within this model. Called by the
    /// loader right after a parser produces an IM; fatal if it fails.
    pub fn validate_references(&self) -> Result<(), crate::error::LoadError> {
        use crate::error::LoadError;

        for role in self.roles.values() {
            if !self.policies.contains_key(&role.policy_mrn) {
                return Err(LoadError::UnresolvedReference(format!(
                    "role '{}' references unknown policy '{}'",
                    role.mrn, role.policy_mrn
                )));
            }
        }
        for group in self.groups.values() {
            for role_mrn in &group.role_mrns {
                if !self.roles.contains_key(role_mrn) {
                    return Err(LoadError::UnresolvedReference(format!(
                        "group '{}' references unknown role '{}'",
                        group.mrn, role_mrn
                    )));
                }
            }
        }
        for op in &self.operations {
            if !self.policies.contains_key(&op.policy_mrn) {
                return Err(LoadError::UnresolvedReference(format!(
                    "operation '{}' references unknown policy '{}'",
                    op.name, op.policy_mrn
                )));
            }
        }
        for res in &self.resources {
            if let Some(policy_mrn) = &res.policy_mrn {
                if !self.policies.contains_key(policy_mrn) {
                    return Err(LoadError::UnresolvedReference(format!(
                        "resource rule '{}' references unknown policy '{}'",
                        res.name, policy_mrn
                    )));
                }
            }
            if let Some(group_mrn) = &res.group_mrn {
                if !self.resource_groups.contains_key(group_mrn) {
                    return Err(LoadError::UnresolvedReference(format!(
                        "resource rule '{}' references unknown resource group '{}'",
                        res.name, group_mrn
                    )));
                }
            }
        }
        Ok(())
    }
}
