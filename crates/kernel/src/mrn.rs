use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An MRN (Manetu Resource Name): an opaque, textual, globally unique
/// identifier of the form `mrn:<realm>:<kind>:<tail>`.
///
/// MRNs are compared byte-equal and are never parsed into their segments
/// by the engine itself — only the loader validates shape at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mrn(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MrnError {
    #[error("MRN must not be empty")]
    Empty,
    #[error("MRN '{0}' must start with 'mrn:' and have at least 3 colon-separated segments")]
    Malformed(String),
}

impl Mrn {
    pub fn parse(raw: impl Into<String>) -> Result<Self, MrnError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(MrnError::Empty);
        }
        let mut segments = raw.splitn(4, ':');
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some("mrn"), Some(realm), Some(kind), Some(tail))
                if !realm.is_empty() && !kind.is_empty() && !tail.is_empty() =>
            {
                Ok(Mrn(raw))
            }
            _ => Err(MrnError::Malformed(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Mrn {
    type Err = MrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mrn::parse(s)
    }
}

impl AsRef<str> for Mrn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
