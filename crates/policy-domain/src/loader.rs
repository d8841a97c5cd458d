//! Sniffs a PolicyDomain document's preamble and dispatches to the
//! registered parser for its `apiVersion`.

use crate::error::LoadError;
use crate::model::IntermediateModel;
use crate::schema::{self, Preamble, EXPECTED_KIND};
use tracing::{info, instrument};

/// Load and normalize a PolicyDomain document.
///
/// Fails with [`LoadError::WrongKind`] if `kind != PolicyDomain`,
/// [`LoadError::UnsupportedVersion`] if `apiVersion` is not registered,
/// or [`LoadError::ParseError`] on YAML malformation (including strict
/// decoding failures raised deeper in the version-specific parser).
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn load_policy_domain(bytes: &[u8]) -> Result<IntermediateModel, LoadError> {
    let preamble: Preamble =
        serde_yaml::from_slice(bytes).map_err(|e| LoadError::ParseError(e.to_string()))?;

    if preamble.kind != EXPECTED_KIND {
        return Err(LoadError::WrongKind(format!(
            "expected PolicyDomain, found '{}'",
            preamble.kind
        )));
    }

    let parse = schema::parser_for(&preamble.api_version).ok_or_else(|| {
        LoadError::UnsupportedVersion(format!(
            "unsupported PolicyDomain API Version '{}'",
            preamble.api_version
        ))
    })?;

    let im = parse(bytes)?;
    info!(
        domain = %im.name,
        api_version = %preamble.api_version,
        policies = im.policies.len(),
        roles = im.roles.len(),
        groups = im.groups.len(),
        operations = im.operations.len(),
        "loaded PolicyDomain"
    );
    Ok(im)
}
