//! Field-level diff between two configuration documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// A single changed leaf, addressed by dot path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old_value, self.new_value)
    }
}

/// Compare two values, ignoring floating point precision issues.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => {
            if let (Some(fa), Some(fb)) = (na.as_f64(), nb.as_f64()) {
                (fa - fb).abs() < 1e-10
            } else {
                na == nb
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Diff `old` against `new`, recursing into objects.
///
/// Paths are prefixed with `prefix` (pass `""` for none). A side that lacks a
/// field is reported as `null`. Arrays and scalars are compared whole.
pub fn diff_fields(prefix: &str, old: Option<&Value>, new: Option<&Value>) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    collect(prefix, old, new, &mut changes);
    changes
}

fn collect(path: &str, old: Option<&Value>, new: Option<&Value>, changes: &mut Vec<FieldChange>) {
    match (old, new) {
        (Some(Value::Object(src)), Some(Value::Object(tgt))) => {
            let fields: BTreeSet<&String> = src.keys().chain(tgt.keys()).collect();
            for field in fields {
                let child = if path.is_empty() {
                    field.clone()
                } else {
                    format!("{}.{}", path, field)
                };
                collect(&child, src.get(field), tgt.get(field), changes);
            }
        }
        (Some(a), Some(b)) if values_equal(a, b) => {}
        (None, None) => {}
        (old, new) => changes.push(FieldChange {
            field: path.to_string(),
            old_value: old.cloned().unwrap_or(Value::Null),
            new_value: new.cloned().unwrap_or(Value::Null),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_nested_fields() {
        let old = json!({"runtime": "node18", "tags": {"team": "core", "tier": 1}});
        let new = json!({"runtime": "node20", "tags": {"team": "core", "tier": 2}});

        let changes = diff_fields("", Some(&old), Some(&new));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "runtime");
        assert_eq!(changes[0].old_value, json!("node18"));
        assert_eq!(changes[0].new_value, json!("node20"));
        assert_eq!(changes[1].field, "tags.tier");
    }

    #[test]
    fn test_diff_added_and_removed_fields() {
        let old = json!({"a": 1});
        let new = json!({"b": 2});
        let changes = diff_fields("defaults", Some(&old), Some(&new));
        assert_eq!(
            changes,
            vec![
                FieldChange { field: "defaults.a".into(), old_value: json!(1), new_value: Value::Null },
                FieldChange { field: "defaults.b".into(), old_value: Value::Null, new_value: json!(2) },
            ]
        );
    }

    #[test]
    fn test_diff_whole_subtree_added() {
        let changes = diff_fields("region", None, Some(&json!("eu-west-1")));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Value::Null);
    }

    #[test]
    fn test_no_changes() {
        let doc = json!({"a": [1, 2], "b": {"c": 1.0}});
        assert!(diff_fields("", Some(&doc), Some(&doc.clone())).is_empty());
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(&json!(1), &json!(1)));
        assert!(values_equal(&json!(1.0), &json!(1.0)));
        assert!(values_equal(&json!([1.0, {"x": 2}]), &json!([1.0, {"x": 2}])));
        assert!(!values_equal(&json!(1), &json!(2)));
        assert!(!values_equal(&json!("a"), &json!("b")));
    }

    #[test]
    fn test_field_change_display() {
        let change = FieldChange {
            field: "region".into(),
            old_value: json!("eu"),
            new_value: json!("us"),
        };
        assert_eq!(change.to_string(), "region: \"eu\" -> \"us\"");
    }
}
