//! Policy Evaluator Adapter: wraps the embedded policy-language
//! evaluator — out of scope itself, treated as an oracle — behind a
//! narrow `compile`/`evaluate` capability, and caches compiled programs
//! keyed by policy MRN for the engine's lifetime.

pub mod adapter;
pub mod cedar_backend;
pub mod error;

pub use adapter::{CachingPolicyEvaluator, EvalInput, EvalOutcome, PolicyEvaluator};
pub use cedar_backend::CedarPolicyEvaluator;
pub use error::EvalAdapterError;
