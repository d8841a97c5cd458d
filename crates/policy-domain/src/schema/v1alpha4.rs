//! `iamlite.manetu.io/v1alpha4`: introduces `annotation-defaults.merge`,
//! `resources[]`, and per-rule `annotations[]` carrying their own
//! per-annotation `merge` strategy.

use crate::error::LoadError;
use crate::model::{
    Annotation, AnnotationDefaults, Group, IntermediateModel, OperationRule, Policy,
    ResourceRule, Role,
};
use kernel::{MergeStrategy, Mrn};
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

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
struct RawAnnotationDefaults {
    merge: Option<MergeStrategy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct Spec {
    #[serde(default)]
    annotation_defaults: RawAnnotationDefaults,
    #[serde(default)]
    policies: Vec<RawPolicy>,
    #[serde(default)]
    roles: Vec<RawRole>,
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    resources: Vec<RawResourceRule>,
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
    merge: Option<MergeStrategy>,
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
struct RawResourceRule {
    name: String,
    selectors: Vec<String>,
    policy: Option<String>,
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

fn mrn_of(raw: &str) -> Result<Mrn, LoadError> {
    Mrn::from_str(raw).map_err(|e| LoadError::ParseError(e.to_string()))
}

fn lower_annotations(raw: Vec<RawAnnotation>) -> Vec<Annotation> {
    raw.into_iter()
        .map(|a| Annotation {
            name: a.name,
            value: a.value,
            merge: a.merge,
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

    let mut resources = Vec::new();
    for res in doc.spec.resources {
        resources.push(ResourceRule {
            name: res.name,
            selectors: res.selectors,
            group_mrn: None,
            policy_mrn: res.policy.as_deref().map(mrn_of).transpose()?,
            annotations: lower_annotations(res.annotations),
        });
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
        annotation_defaults: AnnotationDefaults {
            merge_strategy: doc.spec.annotation_defaults.merge.unwrap_or_default(),
        },
        policies,
        roles,
        groups,
        resources,
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
apiVersion: iamlite.manetu.io/v1alpha4
kind: PolicyDomain
metadata:
  name: example
spec:
  annotation-defaults:
    merge: deep
  policies:
    - mrn: "mrn:iam:policy:allow-all"
      name: allow-all
      source: "default allow = true"
  roles:
    - mrn: "mrn:iam:role:admin"
      name: admin
      policy: "mrn:iam:policy:allow-all"
      annotations:
        - name: scope
          value: {a: 1}
          merge: deep
  groups:
    - mrn: "mrn:iam:group:admins"
      name: admins
      roles: ["mrn:iam:role:admin"]
  resources:
    - name: any-resource
      selectors: [".*"]
  operations:
    - name: any
      selectors: [".*"]
      policy: "mrn:iam:policy:allow-all"
"#;

    #[test]
    fn parses_annotation_defaults_and_resources() {
        let im = parse(DOC.as_bytes()).unwrap();
        assert_eq!(im.annotation_defaults.merge_strategy, MergeStrategy::Deep);
        assert_eq!(im.resources.len(), 1);
        assert!(im.resources[0].group_mrn.is_none());
        assert_eq!(im.roles[&Mrn::from_str("mrn:iam:role:admin").unwrap()].annotations.len(), 1);
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let bad = DOC.replace("kind: PolicyDomain", "kind: PolicyDomain\nbogus: 1");
        assert!(parse(bad.as_bytes()).is_err());
    }
}
