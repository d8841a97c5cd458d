//! Cedar-backed implementation of [`PolicyEvaluator`]: Cedar types never
//! leak past this module's boundary.

use crate::adapter::{EvalInput, EvalOutcome, PolicyEvaluator};
use crate::error::EvalAdapterError;
use cedar_policy::{Authorizer, Context, Decision, Entities, EntityUid, PolicySet, Request};
use std::str::FromStr;
use tracing::{debug, warn};

pub struct CompiledCedarPolicy {
    pub(crate) set: PolicySet,
}

/// Treats every annotated PORC as addressed to three synthetic entities
/// (`Principal::"<sub>"`, `Action::"<operation id>"`, `Resource::"<id>"`)
/// with the full evaluator input document — `{ principal, operation,
/// resource, context, annotations }` — carried as the Cedar request
/// context rather than as entity attributes. This keeps the adapter
/// independent of any particular Cedar entity schema, appropriate for a
/// component whose actual policy language is out of this system's scope
/// (see DESIGN.md).
pub struct CedarPolicyEvaluator {
    authorizer: Authorizer,
}

impl Default for CedarPolicyEvaluator {
    fn default() -> Self {
        CedarPolicyEvaluator {
            authorizer: Authorizer::new(),
        }
    }
}

fn entity_uid(type_name: &str, id: &str) -> Result<EntityUid, EvalAdapterError> {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    EntityUid::from_str(&format!("{type_name}::\"{escaped}\""))
        .map_err(|e| EvalAdapterError::EvalError(format!("invalid {type_name} id '{id}': {e}")))
}

impl PolicyEvaluator for CedarPolicyEvaluator {
    type Compiled = CompiledCedarPolicy;

    fn compile(&self, source: &str) -> Result<Self::Compiled, EvalAdapterError> {
        let set = PolicySet::from_str(source)
            .map_err(|e| EvalAdapterError::CompileError(e.to_string()))?;
        debug!(policies = set.policies().count(), "compiled Cedar policy set");
        Ok(CompiledCedarPolicy { set })
    }

    fn evaluate(
        &self,
        compiled: &Self::Compiled,
        input: &EvalInput,
    ) -> Result<EvalOutcome, EvalAdapterError> {
        let principal = entity_uid("Principal", &input.principal_id)?;
        let action = entity_uid("Action", &input.operation_id)?;
        let resource = entity_uid("Resource", &input.resource_id)?;

        let context = Context::from_json_value(input.document.clone(), None)
            .map_err(|e| EvalAdapterError::EvalError(format!("invalid context: {e}")))?;

        let request = Request::new(principal, action, resource, context, None)
            .map_err(|e| EvalAdapterError::EvalError(format!("invalid request: {e}")))?;

        let entities = Entities::empty();
        let response = self
            .authorizer
            .is_authorized(&request, &compiled.set, &entities);

        let allow = matches!(response.decision(), Decision::Allow);
        let diagnostics: Vec<String> = response
            .diagnostics()
            .reason()
            .map(|policy_id| policy_id.to_string())
            .collect();

        if !diagnostics.is_empty() {
            warn!(?diagnostics, allow, "Cedar evaluation diagnostics");
        }

        Ok(EvalOutcome { allow, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_input() -> EvalInput {
        EvalInput {
            principal_id: "alice".into(),
            operation_id: "api:read".into(),
            resource_id: "doc:1".into(),
            document: serde_json::json!({
                "principal": {"sub": "alice"},
                "operation": {"id": "api:read"},
                "resource": {"id": "doc:1"},
                "context": {},
                "annotations": {}
            }),
        }
    }

    #[test]
    fn permit_all_policy_allows() {
        let evaluator = CedarPolicyEvaluator::default();
        let compiled = evaluator
            .compile("permit(principal, action, resource);")
            .unwrap();
        let outcome = evaluator.evaluate(&compiled, &eval_input()).unwrap();
        assert!(outcome.allow);
    }

    #[test]
    fn forbid_all_policy_denies() {
        let evaluator = CedarPolicyEvaluator::default();
        let compiled = evaluator
            .compile("forbid(principal, action, resource);")
            .unwrap();
        let outcome = evaluator.evaluate(&compiled, &eval_input()).unwrap();
        assert!(!outcome.allow);
    }

    #[test]
    fn malformed_policy_source_is_a_compile_error() {
        let evaluator = CedarPolicyEvaluator::default();
        match evaluator.compile("not cedar at all {{{") {
            Err(EvalAdapterError::CompileError(_)) => {}
            other => panic!("expected CompileError, got {other:?}"),
        }
    }

    #[test]
    fn principal_id_with_quotes_is_escaped_safely() {
        let evaluator = CedarPolicyEvaluator::default();
        let compiled = evaluator
            .compile("permit(principal, action, resource);")
            .unwrap();
        let mut input = eval_input();
        input.principal_id = "weird\"id".into();
        let outcome = evaluator.evaluate(&compiled, &input).unwrap();
        assert!(outcome.allow);
    }
}
