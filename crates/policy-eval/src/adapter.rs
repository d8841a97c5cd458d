use crate::error::EvalAdapterError;
use dashmap::DashMap;
use kernel::Mrn;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The full evaluator input document for one policy: `{ principal,
/// operation, resource, context, annotations }` collapsed to the three
/// identifiers Cedar needs plus the whole document as context.
#[derive(Debug, Clone)]
pub struct EvalInput {
    pub principal_id: String,
    pub operation_id: String,
    pub resource_id: String,
    pub document: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub allow: bool,
    pub diagnostics: Vec<String>,
}

/// The narrow capability a policy-language evaluator must provide: a
/// type that could be backed by a linked native library, an external
/// process, or an in-memory stub for tests.
pub trait PolicyEvaluator: Send + Sync {
    type Compiled: Send + Sync;

    fn compile(&self, source: &str) -> Result<Self::Compiled, EvalAdapterError>;
    fn evaluate(
        &self,
        compiled: &Self::Compiled,
        input: &EvalInput,
    ) -> Result<EvalOutcome, EvalAdapterError>;
}

/// Adds lazy, once-per-`policy_mrn` compilation caching around any
/// [`PolicyEvaluator`] backend: compilation is guarded so each
/// `policy_mrn` compiles at most once, and concurrent `evaluate` calls
/// are safe once compiled.
pub struct CachingPolicyEvaluator<E: PolicyEvaluator> {
    inner: E,
    cache: DashMap<Mrn, Arc<E::Compiled>>,
}

impl<E: PolicyEvaluator> CachingPolicyEvaluator<E> {
    pub fn new(inner: E) -> Self {
        CachingPolicyEvaluator {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Returns the cached compiled program for `policy_mrn`, compiling
    /// and inserting it on first use. `source` is only consulted on a
    /// cache miss.
    #[instrument(skip(self, source), fields(policy_mrn = %policy_mrn))]
    pub fn compiled(
        &self,
        policy_mrn: &Mrn,
        source: &str,
    ) -> Result<Arc<E::Compiled>, EvalAdapterError> {
        if let Some(existing) = self.cache.get(policy_mrn) {
            return Ok(existing.clone());
        }

        let compiled = Arc::new(self.inner.compile(source)?);
        let entry = self
            .cache
            .entry(policy_mrn.clone())
            .or_insert_with(|| compiled.clone());
        debug!(policy_mrn = %policy_mrn, "policy compiled and cached");
        Ok(entry.clone())
    }

    pub fn evaluate(
        &self,
        compiled: &E::Compiled,
        input: &EvalInput,
    ) -> Result<EvalOutcome, EvalAdapterError> {
        self.inner.evaluate(compiled, input)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::str::FromStr;

    struct CountingEvaluator {
        compiles: AtomicUsize,
    }

    impl PolicyEvaluator for CountingEvaluator {
        type Compiled = String;

        fn compile(&self, source: &str) -> Result<Self::Compiled, EvalAdapterError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(source.to_string())
        }

        fn evaluate(
            &self,
            compiled: &Self::Compiled,
            _input: &EvalInput,
        ) -> Result<EvalOutcome, EvalAdapterError> {
            Ok(EvalOutcome {
                allow: compiled == "allow",
                diagnostics: vec![],
            })
        }
    }

    #[test]
    fn compiles_each_policy_mrn_at_most_once() {
        let adapter = CachingPolicyEvaluator::new(CountingEvaluator {
            compiles: AtomicUsize::new(0),
        });
        let mrn = Mrn::from_str("mrn:iam:policy:p").unwrap();

        adapter.compiled(&mrn, "allow").unwrap();
        adapter.compiled(&mrn, "allow").unwrap();
        adapter.compiled(&mrn, "allow").unwrap();

        assert_eq!(adapter.inner.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.cache_len(), 1);
    }

    #[test]
    fn evaluates_through_compiled_program() {
        let adapter = CachingPolicyEvaluator::new(CountingEvaluator {
            compiles: AtomicUsize::new(0),
        });
        let mrn = Mrn::from_str("mrn:iam:policy:p").unwrap();
        let compiled = adapter.compiled(&mrn, "allow").unwrap();
        let outcome = adapter
            .evaluate(
                &compiled,
                &EvalInput {
                    principal_id: "alice".into(),
                    operation_id: "read".into(),
                    resource_id: "doc:1".into(),
                    document: serde_json::json!({}),
                },
            )
            .unwrap();
        assert!(outcome.allow);
    }
}
