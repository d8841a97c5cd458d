use thiserror::Error;

/// `CompileError` is fatal at first load if compilation is eager,
/// otherwise recovered; `EvalError` is always recovered as Deny with a
/// trace entry.
#[derive(Debug, Error, Clone)]
pub enum EvalAdapterError {
    #[error("policy failed to compile: {0}")]
    CompileError(String),
    #[error("policy evaluation failed: {0}")]
    EvalError(String),
}
