//! Auxiliary principal-augmentation data: a flat JSON
//! file keyed by `principal.sub`, loaded once at startup, used to fill
//! in `mannotations` for principals the wire PORC doesn't carry them
//! for (e.g. a proxy frontend authenticating only an identity header).

use policy_domain::Porc;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum AuxDataError {
    #[error("failed to read auxdata file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse auxdata file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuxPrincipalData {
    #[serde(default)]
    mannotations: serde_json::Map<String, serde_json::Value>,
}

/// Read-only once loaded; held behind `Arc` and shared across requests.
#[derive(Debug, Clone, Default)]
pub struct AuxData {
    by_sub: HashMap<String, AuxPrincipalData>,
}

impl AuxData {
    pub fn empty() -> Self {
        AuxData::default()
    }

    pub fn load(path: &str) -> Result<Self, AuxDataError> {
        let contents = fs::read_to_string(path).map_err(|source| AuxDataError::Io {
            path: path.to_string(),
            source,
        })?;
        let by_sub: HashMap<String, AuxPrincipalData> =
            serde_json::from_str(&contents).map_err(|source| AuxDataError::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(AuxData { by_sub })
    }

    /// Fills in `principal.mannotations` from the auxdata entry for this
    /// `sub`, but only when the request didn't already carry its own —
    /// auxdata is a default, never an override.
    pub fn augment(&self, porc: &mut Porc) {
        if !porc.principal.mannotations.is_empty() {
            return;
        }
        if let Some(entry) = self.by_sub.get(&porc.principal.sub) {
            porc.principal.mannotations = entry.mannotations.clone();
        }
    }
}
