use serde::{Deserialize, Serialize};

/// `{ mrn, allow, reason? }` — one entry in an [`AccessRecord`]'s
/// `policies` trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub mrn: String,
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `{ ts, principal_sub, operation, resource, allow, policies: [...] }`
///.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub ts: chrono::DateTime<chrono::Utc>,
    pub principal_sub: String,
    pub operation: String,
    pub resource: String,
    pub allow: bool,
    pub policies: Vec<PolicyOutcome>,
}
