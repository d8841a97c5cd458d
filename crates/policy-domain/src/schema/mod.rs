//! One parser per registered `apiVersion`. Each parser consumes the
//! same document bytes and produces an [`IntermediateModel`]; version
//! differences are absorbed here so nothing downstream needs to know which
//! schema version a domain was authored against.

pub mod v1alpha3;
pub mod v1alpha4;
pub mod v1beta1;

use crate::error::LoadError;
use crate::model::IntermediateModel;
use serde::Deserialize;

pub const API_VERSION_V1ALPHA3: &str = "iamlite.manetu.io/v1alpha3";
pub const API_VERSION_V1ALPHA4: &str = "iamlite.manetu.io/v1alpha4";
pub const API_VERSION_V1BETA1: &str = "iamlite.manetu.io/v1beta1";

pub const EXPECTED_KIND: &str = "PolicyDomain";

/// The part of the document every version agrees on: enough to dispatch
/// to the right parser without committing to either schema's `spec` shape.
#[derive(Debug, Deserialize)]
pub struct Preamble {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
}

/// A registered schema parser: given the full document bytes (already
/// known to match this parser's `apiVersion`), produce an IM.
pub type ParseFn = fn(&[u8]) -> Result<IntermediateModel, LoadError>;

/// Look up the parser registered for an exact `apiVersion` string match.
pub fn parser_for(api_version: &str) -> Option<ParseFn> {
    match api_version {
        API_VERSION_V1ALPHA3 => Some(v1alpha3::parse),
        API_VERSION_V1ALPHA4 => Some(v1alpha4::parse),
        API_VERSION_V1BETA1 => Some(v1beta1::parse),
        _ => None,
    }
}
