//! The version-independent PolicyDomain model plus everything needed to
//! produce one from a YAML document: the versioned schema parsers, the
//! loader that dispatches between them, the annotation merger, and the
//! compiled selector index used during decision-making.

pub mod error;
pub mod loader;
pub mod merger;
pub mod model;
pub mod porc;
pub mod schema;
pub mod selector;

pub use error::LoadError;
pub use loader::load_policy_domain;
pub use model::*;
pub use porc::{Porc, PorcError};
