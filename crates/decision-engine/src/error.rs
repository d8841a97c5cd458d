use thiserror::Error;

/// Failures that keep a decision from being reached at all. A
/// request with no matching operation, or a policy that fails to
/// compile or evaluate, is not one of these — those degrade to a Deny
/// [`crate::Decision`] carrying a reason instead.
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reserved for a policy evaluator that validates eagerly and
    /// rejects a request before any policy runs; the bundled evaluator
    /// is lazy, so `decide` never produces this variant itself.
    #[error("policy evaluator failure: {0}")]
    EvalError(String),

    #[error("decision cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<policy_domain::PorcError> for PipelineError {
    fn from(err: policy_domain::PorcError) -> Self {
        PipelineError::InvalidRequest(err.to_string())
    }
}
