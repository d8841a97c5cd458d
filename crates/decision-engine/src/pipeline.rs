//! The decision pipeline: resolves a PORC against a loaded
//! PolicyDomain, merges applicable annotations, evaluates every
//! required policy, and emits an [`AccessRecord`].

use crate::cancellation::Cancellation;
use crate::error::PipelineError;
use access_log::{AccessLogSink, AccessRecord, PolicyOutcome};
use kernel::Mrn;
use policy_domain::merger::{merge_annotations, AnnotationLayer};
use policy_domain::model::{Annotation, Group, IntermediateModel, Role};
use policy_domain::selector::SelectorIndex;
use policy_domain::Porc;
use policy_eval::{CachingPolicyEvaluator, EvalInput, EvalOutcome, PolicyEvaluator};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{instrument, warn};

fn deny_with_diagnostic(policy_mrn: &Mrn, err: impl std::fmt::Display) -> EvalOutcome {
    warn!(policy = %policy_mrn, error = %err, "policy unavailable, treating as deny");
    EvalOutcome {
        allow: false,
        diagnostics: vec![err.to_string()],
    }
}

/// The outcome of one decision: whether every required policy allowed
/// the request, a per-policy trace for the access log, and — on a deny
/// — the MRN of the policy that denied it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allow: bool,
    pub trace: Vec<PolicyOutcome>,
    pub reason: Option<String>,
}

/// Ties a loaded PolicyDomain, its compiled selector index, a caching
/// policy evaluator, and an access log sink together into the single
/// entry point a PDP server calls per request.
pub struct DecisionEngine<E: PolicyEvaluator> {
    im: Arc<IntermediateModel>,
    index: SelectorIndex,
    evaluator: CachingPolicyEvaluator<E>,
    sink: Arc<dyn AccessLogSink>,
}

impl<E: PolicyEvaluator> DecisionEngine<E> {
    pub fn new(
        im: Arc<IntermediateModel>,
        evaluator: E,
        sink: Arc<dyn AccessLogSink>,
    ) -> Result<Self, policy_domain::error::SelectorError> {
        let index = SelectorIndex::build(&im)?;
        Ok(DecisionEngine {
            im,
            index,
            evaluator: CachingPolicyEvaluator::new(evaluator),
            sink,
        })
    }

    /// Resolves the principal's declared groups and roles into the
    /// distinct, declared-order list of roles that apply: roles reached
    /// through a group first, then the principal's own directly
    /// declared roles, each only once. Unknown or malformed MRNs are
    /// logged and skipped rather than aborting the decision.
    fn resolve_groups_and_roles<'a>(
        &'a self,
        mgroups: &[String],
        mroles: &[String],
    ) -> (Vec<&'a Group>, Vec<&'a Role>) {
        let mut groups = Vec::new();
        let mut seen_groups = HashSet::new();
        let mut role_mrns = Vec::new();
        let mut seen_roles = HashSet::new();

        for raw in mgroups {
            let group_mrn = match Mrn::parse(raw) {
                Ok(mrn) => mrn,
                Err(_) => {
                    warn!(mrn = %raw, "principal references malformed group MRN");
                    continue;
                }
            };
            let Some(group) = self.im.groups.get(&group_mrn) else {
                warn!(mrn = %group_mrn, "principal references unknown group");
                continue;
            };
            if seen_groups.insert(group_mrn.clone()) {
                groups.push(group);
            }
            for role_mrn in &group.role_mrns {
                if seen_roles.insert(role_mrn.clone()) {
                    role_mrns.push(role_mrn.clone());
                }
            }
        }

        for raw in mroles {
            let role_mrn = match Mrn::parse(raw) {
                Ok(mrn) => mrn,
                Err(_) => {
                    warn!(mrn = %raw, "principal references malformed role MRN");
                    continue;
                }
            };
            if !self.im.roles.contains_key(&role_mrn) {
                warn!(mrn = %role_mrn, "principal references unknown role");
                continue;
            }
            if seen_roles.insert(role_mrn.clone()) {
                role_mrns.push(role_mrn);
            }
        }

        let roles = role_mrns
            .iter()
            .filter_map(|mrn| self.im.roles.get(mrn))
            .collect();

        (groups, roles)
    }

    #[instrument(skip(self, porc), fields(sub = %porc.principal.sub, operation = %porc.operation.id, resource = %porc.resource.id))]
    pub fn decide(&self, porc: Porc, cancel: &Cancellation) -> Result<Decision, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let Some(operation) = self.index.match_operation(&porc.operation.id) else {
            // No fatal error: an unmatched operation is a Deny decision
            // with a reason, not a pipeline failure.
            self.sink.submit(AccessRecord {
                ts: chrono::Utc::now(),
                principal_sub: porc.principal.sub.clone(),
                operation: porc.operation.id.clone(),
                resource: porc.resource.id.clone(),
                allow: false,
                policies: vec![],
            });
            return Ok(Decision {
                allow: false,
                trace: vec![],
                reason: Some("no operation rule matches the requested operation".to_string()),
            });
        };

        let resource_rules = self.index.match_resources(&porc.resource.id);
        let first_resource = resource_rules.first().copied();

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let (groups, roles) =
            self.resolve_groups_and_roles(&porc.principal.mgroups, &porc.principal.mroles);

        let resource_group = first_resource
            .and_then(|r| r.group_mrn.as_ref())
            .and_then(|mrn| self.im.resource_groups.get(mrn));

        let principal_annotations: Vec<Annotation> = porc
            .principal
            .mannotations
            .iter()
            .map(|(name, value)| Annotation {
                name: name.clone(),
                value: value.clone(),
                merge: None,
            })
            .collect();

        let mut layers = vec![AnnotationLayer::new("operation", &operation.annotations)];
        if let Some(rule) = first_resource {
            layers.push(AnnotationLayer::new("resource-rule", &rule.annotations));
        }
        if let Some(group) = resource_group {
            layers.push(AnnotationLayer::new("resource-group", &group.annotations));
        }
        for group in &groups {
            layers.push(AnnotationLayer::new("principal-group", &group.annotations));
        }
        for role in &roles {
            layers.push(AnnotationLayer::new("principal-role", &role.annotations));
        }
        layers.push(AnnotationLayer::new("principal", &principal_annotations));

        let annotations =
            merge_annotations(self.im.annotation_defaults.merge_strategy, &layers);

        let mut required: Vec<Mrn> = vec![operation.policy_mrn.clone()];
        if let Some(rule) = first_resource {
            if let Some(policy_mrn) = &rule.policy_mrn {
                required.push(policy_mrn.clone());
            }
        }
        for role in &roles {
            required.push(role.policy_mrn.clone());
        }
        let mut seen_policies = HashSet::new();
        required.retain(|mrn| seen_policies.insert(mrn.clone()));

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let document = json!({
            "principal": porc.principal,
            "operation": { "id": porc.operation.id },
            "resource": porc.resource.raw,
            "context": porc.context,
            "annotations": annotations,
        });

        let mut trace = Vec::with_capacity(required.len());
        let mut allow = true;
        let mut reason = None;

        for policy_mrn in &required {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let policy = self.im.policies.get(policy_mrn).ok_or_else(|| {
                PipelineError::Internal(format!(
                    "required policy '{policy_mrn}' is missing from the loaded domain"
                ))
            })?;

            let eval_input = EvalInput {
                principal_id: porc.principal.sub.clone(),
                operation_id: porc.operation.id.clone(),
                resource_id: porc.resource.id.clone(),
                document: document.clone(),
            };

            // Compilation here is lazy (on first use of this policy_mrn),
            // not eager at load time, so a CompileError is not fatal: it
            // degrades to the same Deny-with-diagnostic treatment as a
            // runtime EvalError.
            let outcome = match self.evaluator.compiled(policy_mrn, &policy.source) {
                Ok(compiled) => self
                    .evaluator
                    .evaluate(compiled.as_ref(), &eval_input)
                    .unwrap_or_else(|e| deny_with_diagnostic(policy_mrn, e)),
                Err(e) => deny_with_diagnostic(policy_mrn, e),
            };

            trace.push(PolicyOutcome {
                mrn: policy_mrn.to_string(),
                allow: outcome.allow,
                reason: outcome.diagnostics.first().cloned(),
            });

            if !outcome.allow {
                allow = false;
                reason = Some(format!("denied by policy '{policy_mrn}'"));
                break;
            }
        }

        self.sink.submit(AccessRecord {
            ts: chrono::Utc::now(),
            principal_sub: porc.principal.sub.clone(),
            operation: porc.operation.id.clone(),
            resource: porc.resource.id.clone(),
            allow,
            policies: trace.clone(),
        });

        Ok(Decision {
            allow,
            trace,
            reason,
        })
    }
}
