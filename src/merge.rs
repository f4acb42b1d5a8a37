//! Deep merge of labeled configuration layers.
//!
//! Layers are applied left to right and later layers win at any path:
//! - Objects are merged recursively over the union of their keys
//! - Arrays are replaced (default) or concatenated, see [`ArrayPolicy`]
//! - `null` is an explicit override; a missing key never touches the prior value
//! - Any other combination (including type mismatches) replaces the prior value entirely
//!
//! Provenance is collected during the same traversal that builds the merged value,
//! so the audit trail always agrees with the result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How two arrays at the same path are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayPolicy {
    /// The later array replaces the earlier one.
    #[default]
    Replace,
    /// The later array is appended to the earlier one.
    Concat,
}

impl std::str::FromStr for ArrayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(ArrayPolicy::Replace),
            "concat" => Ok(ArrayPolicy::Concat),
            other => Err(format!("unknown array policy '{}'", other)),
        }
    }
}

/// Options controlling a layered merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeOptions {
    #[serde(default)]
    pub array_policy: ArrayPolicy,
    /// Collect `(layer, path)` contributions for every leaf set by a non-first layer.
    #[serde(default)]
    pub track_provenance: bool,
}

impl MergeOptions {
    pub fn with_array_policy(mut self, policy: ArrayPolicy) -> Self {
        self.array_policy = policy;
        self
    }

    pub fn with_provenance(mut self) -> Self {
        self.track_provenance = true;
        self
    }
}

/// One labeled partial document. A `None` document is skipped entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub label: String,
    pub document: Option<Value>,
}

impl Layer {
    pub fn new(label: impl Into<String>, document: Value) -> Self {
        Self {
            label: label.into(),
            document: Some(document),
        }
    }

    pub fn absent(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            document: None,
        }
    }

    pub fn optional(label: impl Into<String>, document: Option<Value>) -> Self {
        Self {
            label: label.into(),
            document,
        }
    }
}

/// A leaf written by a layer, addressed by dot path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub layer: String,
    pub path: String,
}

/// Result of [`merge_layers`].
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub value: Value,
    /// Labels of the layers that were present and applied, in order.
    pub applied: Vec<String>,
    /// Present only when provenance tracking was requested.
    pub contributions: Option<Vec<Contribution>>,
    winners: BTreeMap<String, String>,
}

impl MergeOutcome {
    /// Label of the layer that last wrote the leaf at `path`.
    pub fn winner(&self, path: &str) -> Option<&str> {
        self.winners.get(path).map(String::as_str)
    }

    /// Last-writer-per-leaf map. Empty unless provenance tracking was requested.
    pub fn provenance(&self) -> &BTreeMap<String, String> {
        &self.winners
    }
}

/// Merge an ordered list of labeled layers.
pub fn merge_layers(layers: impl IntoIterator<Item = Layer>, options: &MergeOptions) -> MergeOutcome {
    let mut tracker = Tracker {
        enabled: options.track_provenance,
        label: String::new(),
        record_contributions: false,
        contributions: Vec::new(),
        winners: BTreeMap::new(),
    };
    let mut merged: Option<Value> = None;
    let mut applied = Vec::new();

    for layer in layers {
        let Some(document) = layer.document else {
            continue;
        };
        tracker.label = layer.label.clone();
        merged = Some(match merged {
            None => {
                tracker.record_contributions = false;
                tracker.record_subtree("", &document);
                document
            }
            Some(base) => {
                tracker.record_contributions = true;
                merge_value(base, document, "", options.array_policy, &mut tracker)
            }
        });
        applied.push(layer.label);
    }

    MergeOutcome {
        value: merged.unwrap_or_else(|| Value::Object(Map::new())),
        applied,
        contributions: options.track_provenance.then_some(tracker.contributions),
        winners: tracker.winners,
    }
}

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// Uses [`ArrayPolicy::Replace`] and treats `null` in the overlay as an explicit override.
///
/// # Example
/// ```
/// use serde_json::json;
/// use config_resolution::merge::deep_merge;
///
/// let base = json!({ "server": { "port": 8080, "host": "localhost" }, "features": ["a", "b"] });
/// let overlay = json!({ "server": { "port": 9000 }, "features": ["c"] });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result, json!({ "server": { "port": 9000, "host": "localhost" }, "features": ["c"] }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    let mut tracker = Tracker::disabled();
    merge_value(base, overlay, "", ArrayPolicy::Replace, &mut tracker)
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    let layers = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Layer::new(i.to_string(), value));
    merge_layers(layers, &MergeOptions::default()).value
}

fn merge_value(
    base: Value,
    overlay: Value,
    path: &str,
    policy: ArrayPolicy,
    tracker: &mut Tracker,
) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            if !overlay_map.is_empty() {
                // An empty object filled in here is no longer a leaf.
                tracker.forget_leaf(path);
            }
            for (key, overlay_value) in overlay_map {
                let child = join_path(path, &key);
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => merge_value(base_value, overlay_value, &child, policy, tracker),
                    None => {
                        tracker.record_subtree(&child, &overlay_value);
                        overlay_value
                    }
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (Value::Array(mut base_items), Value::Array(overlay_items))
            if policy == ArrayPolicy::Concat =>
        {
            base_items.extend(overlay_items);
            tracker.record_leaf(path);
            Value::Array(base_items)
        }
        (_, overlay) => {
            tracker.record_subtree(path, &overlay);
            overlay
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

struct Tracker {
    enabled: bool,
    label: String,
    record_contributions: bool,
    contributions: Vec<Contribution>,
    winners: BTreeMap<String, String>,
}

impl Tracker {
    fn disabled() -> Self {
        Self {
            enabled: false,
            label: String::new(),
            record_contributions: false,
            contributions: Vec::new(),
            winners: BTreeMap::new(),
        }
    }

    /// Record every leaf of a value written wholesale at `path`, dropping
    /// whatever the previous value at that path was attributed to.
    fn record_subtree(&mut self, path: &str, value: &Value) {
        if !self.enabled {
            return;
        }
        self.forget(path);
        self.walk(path, value);
    }

    fn walk(&mut self, path: &str, value: &Value) {
        match value {
            Value::Object(map) if !map.is_empty() || path.is_empty() => {
                for (key, child) in map {
                    self.walk(&join_path(path, key), child);
                }
            }
            _ => self.record_leaf(path),
        }
    }

    fn record_leaf(&mut self, path: &str) {
        if !self.enabled {
            return;
        }
        self.winners.insert(path.to_string(), self.label.clone());
        if self.record_contributions {
            self.contributions.push(Contribution {
                layer: self.label.clone(),
                path: path.to_string(),
            });
        }
    }

    fn forget_leaf(&mut self, path: &str) {
        if self.enabled && !path.is_empty() {
            self.winners.remove(path);
        }
    }

    fn forget(&mut self, path: &str) {
        if path.is_empty() {
            self.winners.clear();
            return;
        }
        let nested = format!("{}.", path);
        self.winners
            .retain(|key, _| key != path && !key.starts_with(&nested));
    }
}
