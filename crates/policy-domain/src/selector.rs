//! Compiled regular-expression sets mapping operation and resource
//! identifiers to operation-rules and resource-rules.
//!
//! Selectors are not documented as anchored or not in the source system;
//! this implementation anchors every selector to a full match
//! (`^(?:sel1|sel2|...)$`) to avoid surprise substring matches — see
//! DESIGN.md for the reasoning.

use crate::error::SelectorError;
use crate::model::{IntermediateModel, OperationRule, ResourceRule};
use regex::Regex;

struct CompiledRule<T> {
    regex: Regex,
    rule: T,
}

/// Read-only, thread-safe once built: lookups only ever borrow `&self`.
pub struct SelectorIndex {
    operations: Vec<CompiledRule<OperationRule>>,
    resources: Vec<CompiledRule<ResourceRule>>,
}

fn compile_selectors(rule_name: &str, selectors: &[String]) -> Result<Regex, SelectorError> {
    if selectors.is_empty() {
        return Err(SelectorError::EmptySelectors(rule_name.to_string()));
    }
    let pattern = format!(
        "^(?:{})$",
        selectors
            .iter()
            .map(|s| format!("(?:{})", s))
            .collect::<Vec<_>>()
            .join("|")
    );
    Regex::new(&pattern).map_err(|source| SelectorError::InvalidPattern {
        rule: rule_name.to_string(),
        source,
    })
}

impl SelectorIndex {
    pub fn build(im: &IntermediateModel) -> Result<Self, SelectorError> {
        let mut operations = Vec::with_capacity(im.operations.len());
        for op in &im.operations {
            let regex = compile_selectors(&op.name, &op.selectors)?;
            operations.push(CompiledRule {
                regex,
                rule: op.clone(),
            });
        }

        let mut resources = Vec::with_capacity(im.resources.len());
        for res in &im.resources {
            let regex = compile_selectors(&res.name, &res.selectors)?;
            resources.push(CompiledRule {
                regex,
                rule: res.clone(),
            });
        }

        Ok(SelectorIndex {
            operations,
            resources,
        })
    }

    /// First declared-order match wins.
    pub fn match_operation(&self, operation_id: &str) -> Option<&OperationRule> {
        self.operations
            .iter()
            .find(|r| r.regex.is_match(operation_id))
            .map(|r| &r.rule)
    }

    /// All matching resource-rules apply; the caller
    /// uses only the first for `group_mrn`/`policy_mrn`.
    pub fn match_resources(&self, resource_id: &str) -> Vec<&ResourceRule> {
        self.resources
            .iter()
            .filter(|r| r.regex.is_match(resource_id))
            .map(|r| &r.rule)
            .collect()
    }
}
