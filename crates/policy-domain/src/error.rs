use thiserror::Error;

/// PolicyDomain load failures: all fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("kind error: expected PolicyDomain, found '{0}'")]
    WrongKind(String),

    #[error("unsupported PolicyDomain API Version '{0}'")]
    UnsupportedVersion(String),

    #[error("failed to parse PolicyDomain document: {0}")]
    ParseError(String),

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
}

/// Raised while compiling a rule's selector list into a regular
/// expression.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("rule '{0}' has an empty selector list")]
    EmptySelectors(String),
    #[error("rule '{rule}' has invalid selector pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}
