//! Wires the PolicyDomain model, the selector index, the policy
//! evaluator adapter, and the access log together into the decision
//! pipeline: the single operation a PDP server calls once per
//! incoming PORC.

pub mod cancellation;
pub mod error;
pub mod pipeline;

pub use cancellation::Cancellation;
pub use error::PipelineError;
pub use pipeline::{Decision, DecisionEngine};
