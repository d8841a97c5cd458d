//! `iamlite.manetu.io/v1alpha3`: the original shape. No
//! `annotation-defaults`, no `resources`, no `resource-groups` — those
//! fields come out of the resulting IM empty / defaulted to `replace`
//!.

use crate::error::LoadError;
use crate::model::{
    AnnotationDefaults, Group, IntermediateModel, OperationRule, Policy, Role,
};
use kernel::Mrn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(rename = "apiVersion")]
    #[allow(dead_code)]
    api_version: String,
    #[allow(dead_code)]
    kind: String,
    metadata: Metadata,
    spec: Spec,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Spec {
    #[serde(default)]
    policies: Vec<RawPolicy>,
    #[serde(default)]
    roles: Vec<RawRole>,
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    operations: Vec<RawOperationRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    mrn: String,
    name: String,
    description: Option<String>,
    source: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnnotation {
    name: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRole {
    mrn: String,
    name: String,
    policy: String,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    mrn: String,
    name: String,
    roles: Vec<String>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOperationRule {
    name: String,
    selectors: Vec<String>,
    policy: String,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

pub(crate) fn mrn_of(raw: &str) -> Result<Mrn, LoadError> {
    Mrn::from_str(raw).map_err(|e| LoadError::ParseError(e.to_string()))
}

pub(crate) fn lower_annotations(raw: Vec<RawAnnotation>) -> Vec<crate::model::Annotation> {
    raw.into_iter()
        .map(|a| crate::model::Annotation {
            name: a.name,
            value: a.value,
            merge: None,
        })
        .collect()
}

pub fn parse(bytes: &[u8]) -> Result<IntermediateModel, LoadError> {
    let doc: Document =
        serde_yaml::from_slice(bytes).map_err(|e| LoadError::ParseError(e.to_string()))?;

    let mut policies = BTreeMap::new();
    for p in doc.spec.policies {
        let mrn = mrn_of(&p.mrn)?;
        policies.insert(
            mrn.clone(),
            Policy {
                mrn,
                name: p.name,
                description: p.description,
                source: p.source,
            },
        );
    }

    let mut roles = BTreeMap::new();
    for r in doc.spec.roles {
        let mrn = mrn_of(&r.mrn)?;
        roles.insert(
            mrn.clone(),
            Role {
                mrn,
                name: r.name,
                policy_mrn: mrn_of(&r.policy)?,
                annotations: lower_annotations(r.annotations),
            },
        );
    }

    let mut groups = BTreeMap::new();
    for g in doc.spec.groups {
        let mrn = mrn_of(&g.mrn)?;
        let role_mrns = g
            .roles
            .iter()
            .map(|r| mrn_of(r))
            .collect::<Result<Vec<_>, _>>()?;
        groups.insert(
            mrn.clone(),
            Group {
                mrn,
                name: g.name,
                role_mrns,
                annotations: lower_annotations(g.annotations),
            },
        );
    }

    let mut operations = Vec::new();
    for op in doc.spec.operations {
        operations.push(OperationRule {
            name: op.name,
            selectors: op.selectors,
            policy_mrn: mrn_of(&op.policy)?,
            annotations: lower_annotations(op.annotations),
        });
    }

    let im = IntermediateModel {
        name: doc.metadata.name,
        annotation_defaults: AnnotationDefaults::default(),
        policies,
        roles,
        groups,
        resources: Vec::new(),
        resource_groups: BTreeMap::new(),
        operations,
    };
    im.validate_references()?;
    Ok(im)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
apiVersion: iamlite.manetu.io/v1alpha3
kind: PolicyDomain
metadata:
  name: example
spec:
  policies:
    - mrn: "mrn:iam:policy:allow-all"
      name: allow-all
      source: "default allow = true"
  roles:
    - mrn: "mrn:iam:role:admin"
      name: admin
      policy: "mrn:iam:policy:allow-all"
  groups:
    - mrn: "mrn:iam:group:admins"
      name: admins
      roles: ["mrn:iam:role:admin"]
  operations:
    - name: any
      selectors: [".*"]
      policy: "mrn:iam:policy:allow-all"
"#;

    #[test]
    fn parses_minimal_document() {
        let im = parse(DOC.as_bytes()).unwrap();
        assert_eq!(im.name, "example");
        assert_eq!(im.annotation_defaults.merge_strategy, kernel::MergeStrategy::Replace);
        assert!(im.resources.is_empty());
        assert!(im.resource_groups.is_empty());
        assert_eq!(im.operations.len(), 1);
    }

    #[test]
    fn rejects_unknown_fields() {
        let bad = DOC.replace("name: example", "name: example\n  bogus: true");
        assert!(parse(bad.as_bytes()).is_err());
    }

    #[test]
    fn rejects_unresolved_role_policy() {
        let bad = DOC.replace(
            "policy: \"mrn:iam:policy:allow-all\"\n  groups",
            "policy: \"mrn:iam:policy:missing\"\n  groups",
        );
        match parse(bad.as_bytes()) {
            Err(LoadError::UnresolvedReference(_)) => {}
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }
}
