//! PORC (Principal, Operation, Resource, Context) normalization.
//!
//! The wire format accepts a PORC as either a JSON string or an
//! already-parsed map; both paths funnel through the same normalizer
//! (`normalize_value`) so `normalize(S) == normalize(parse(S))` for any
//! valid JSON string `S`. `operation` and `resource` are themselves sum
//! types (bare string id, or an object carrying an `id` plus extra
//! fields) normalized the same way.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PorcError {
    #[error("invalid PORC: malformed JSON: {0}")]
    MalformedJson(String),
    #[error("invalid PORC: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub sub: String,
    #[serde(default)]
    pub mroles: Vec<String>,
    #[serde(default)]
    pub mgroups: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub mclearance: Option<Value>,
    #[serde(default)]
    pub mannotations: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRef {
    pub id: String,
    /// The full resource object as given (owner/group/classification/…)
    /// carried through to the evaluator input document verbatim.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Porc {
    pub principal: Principal,
    pub operation: OperationRef,
    pub resource: ResourceRef,
    pub context: Value,
}

impl Porc {
    pub fn from_json_str(raw: &str) -> Result<Self, PorcError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PorcError::MalformedJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// The single normalizer both the string and pre-parsed-map entry
    /// points funnel through.
    pub fn from_value(value: Value) -> Result<Self, PorcError> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(PorcError::InvalidRequest(format!(
                    "PORC must be a JSON object, got {other}"
                )))
            }
        };

        let principal_value = obj
            .get("principal")
            .ok_or_else(|| PorcError::InvalidRequest("missing 'principal'".into()))?
            .clone();
        let principal: Principal = serde_json::from_value(principal_value)
            .map_err(|e| PorcError::InvalidRequest(format!("invalid 'principal': {e}")))?;

        let operation_value = obj
            .get("operation")
            .ok_or_else(|| PorcError::InvalidRequest("missing 'operation'".into()))?;
        let operation = normalize_operation(operation_value)?;

        let resource_value = obj
            .get("resource")
            .ok_or_else(|| PorcError::InvalidRequest("missing 'resource'".into()))?;
        let resource = normalize_resource(resource_value)?;

        let context = obj
            .get("context")
            .cloned()
            .ok_or_else(|| PorcError::InvalidRequest("missing 'context'".into()))?;
        if !context.is_object() {
            return Err(PorcError::InvalidRequest("'context' must be an object".into()));
        }

        Ok(Porc {
            principal,
            operation,
            resource,
            context,
        })
    }
}

fn normalize_operation(value: &Value) -> Result<OperationRef, PorcError> {
    match value {
        Value::String(s) => Ok(OperationRef { id: s.clone() }),
        Value::Object(obj) => match obj.get("id") {
            Some(Value::String(s)) => Ok(OperationRef { id: s.clone() }),
            _ => Err(PorcError::InvalidRequest(
                "'operation' object requires a string 'id'".into(),
            )),
        },
        other => Err(PorcError::InvalidRequest(format!(
            "'operation' must be a string or object, got {other}"
        ))),
    }
}

fn normalize_resource(value: &Value) -> Result<ResourceRef, PorcError> {
    match value {
        Value::String(s) => Ok(ResourceRef {
            id: s.clone(),
            raw: Value::Object(Map::from_iter([("id".to_string(), Value::String(s.clone()))])),
        }),
        Value::Object(obj) => match obj.get("id") {
            Some(Value::String(s)) => Ok(ResourceRef {
                id: s.clone(),
                raw: value.clone(),
            }),
            _ => Err(PorcError::InvalidRequest(
                "'resource' object requires a string 'id'".into(),
            )),
        },
        other => Err(PorcError::InvalidRequest(format!(
            "'resource' must be a string or object, got {other}"
        ))),
    }
}
