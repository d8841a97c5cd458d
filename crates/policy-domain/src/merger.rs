//! Annotation merger: combines annotation layers, in fixed
//! precedence order, into a single `name -> value` map.

use crate::model::Annotation;
use kernel::MergeStrategy;
use serde_json::Value;
use std::collections::BTreeMap;

/// One layer of annotations plus a tag identifying its source, kept only
/// for diagnostics/tracing — merge order is positional, not tag-driven.
pub struct AnnotationLayer<'a> {
    pub source_tag: &'static str,
    pub annotations: &'a [Annotation],
}

impl<'a> AnnotationLayer<'a> {
    pub fn new(source_tag: &'static str, annotations: &'a [Annotation]) -> Self {
        AnnotationLayer {
            source_tag,
            annotations,
        }
    }
}

/// Merge annotation layers in the order given — the caller is responsible
/// for ordering layers lowest-precedence-first: operation rule, resource
/// rule, resource group, principal groups (in declared order), principal
/// roles (in declared order), principal's own `mannotations`.
pub fn merge_annotations(
    domain_default: MergeStrategy,
    layers: &[AnnotationLayer<'_>],
) -> BTreeMap<String, Value> {
    let mut acc: BTreeMap<String, Value> = BTreeMap::new();

    for layer in layers {
        for annotation in layer.annotations {
            let strategy = annotation.merge.unwrap_or(domain_default);
            tracing::trace!(
                source = layer.source_tag,
                name = %annotation.name,
                strategy = strategy.as_str(),
                "merging annotation"
            );
            match acc.remove(&annotation.name) {
                None => {
                    acc.insert(annotation.name.clone(), annotation.value.clone());
                }
                Some(existing) => {
                    let merged = apply_strategy(strategy, existing, annotation.value.clone());
                    acc.insert(annotation.name.clone(), merged);
                }
            }
        }
    }

    acc
}

fn apply_strategy(strategy: MergeStrategy, existing: Value, incoming: Value) -> Value {
    match strategy {
        MergeStrategy::Replace => incoming,
        MergeStrategy::Shallow => shallow_merge(existing, incoming),
        MergeStrategy::Deep => deep_merge(existing, incoming),
    }
}

fn shallow_merge(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                base.insert(k, v);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

fn deep_merge(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                let merged = match base.remove(&k) {
                    Some(existing_v) => deep_merge(existing_v, v),
                    None => v,
                };
                base.insert(k, merged);
            }
            Value::Object(base)
        }
        // Arrays are replaced wholesale; scalars replace too.
        (_, incoming) => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotation(name: &str, value: Value, merge: Option<MergeStrategy>) -> Annotation {
        Annotation {
            name: name.to_string(),
            value,
            merge,
        }
    }

    #[test]
    fn replace_overwrites() {
        let a = [annotation("x", json!(1), Some(MergeStrategy::Replace))];
        let b = [annotation("x", json!(2), Some(MergeStrategy::Replace))];
        let merged = merge_annotations(
            MergeStrategy::Replace,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        assert_eq!(merged["x"], json!(2));
    }

    #[test]
    fn shallow_merges_top_level_objects() {
        let a = [annotation("scope", json!({"a": 1, "b": 1}), Some(MergeStrategy::Shallow))];
        let b = [annotation("scope", json!({"b": 2, "c": 2}), Some(MergeStrategy::Shallow))];
        let merged = merge_annotations(
            MergeStrategy::Replace,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        assert_eq!(merged["scope"], json!({"a": 1, "b": 2, "c": 2}));
    }

    #[test]
    fn deep_merges_nested_objects_and_replaces_arrays() {
        let a = [annotation(
            "scope",
            json!({"nested": {"a": 1}, "list": [1, 2]}),
            Some(MergeStrategy::Deep),
        )];
        let b = [annotation(
            "scope",
            json!({"nested": {"b": 2}, "list": [3]}),
            Some(MergeStrategy::Deep),
        )];
        let merged = merge_annotations(
            MergeStrategy::Replace,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        assert_eq!(
            merged["scope"],
            json!({"nested": {"a": 1, "b": 2}, "list": [3]})
        );
    }

    #[test]
    fn missing_merge_field_falls_back_to_domain_default() {
        let a = [annotation("x", json!({"a": 1}), None)];
        let b = [annotation("x", json!({"b": 2}), None)];
        let merged = merge_annotations(
            MergeStrategy::Deep,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        assert_eq!(merged["x"], json!({"a": 1, "b": 2}));
    }

    #[test]
    fn associative_on_non_conflicting_keys() {
        let a = [annotation("x", json!(1), None)];
        let b = [annotation("y", json!(2), None)];
        let c = [annotation("z", json!(3), None)];

        let left_to_right = merge_annotations(
            MergeStrategy::Replace,
            &[
                AnnotationLayer::new("a", &a),
                AnnotationLayer::new("b", &b),
                AnnotationLayer::new("c", &c),
            ],
        );

        let ab = merge_annotations(
            MergeStrategy::Replace,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        let ab_annotations: Vec<Annotation> = ab
            .iter()
            .map(|(k, v)| annotation(k, v.clone(), None))
            .collect();
        let ab_then_c = merge_annotations(
            MergeStrategy::Replace,
            &[
                AnnotationLayer::new("ab", &ab_annotations),
                AnnotationLayer::new("c", &c),
            ],
        );

        assert_eq!(left_to_right, ab_then_c);
    }

    #[test]
    fn conflicting_strategies_use_current_annotations_declared_strategy() {
        let a = [annotation("x", json!({"a": 1}), Some(MergeStrategy::Deep))];
        let b = [annotation("x", json!({"b": 2}), Some(MergeStrategy::Replace))];
        let merged = merge_annotations(
            MergeStrategy::Replace,
            &[AnnotationLayer::new("a", &a), AnnotationLayer::new("b", &b)],
        );
        assert_eq!(merged["x"], json!({"b": 2}));
    }
}
