//! Entity types for the configuration store.
//!
//! Entities are semi-structured: the fields the engine needs are typed, and
//! everything else is carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Repository-wide system description. At most one per store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Global defaults (runtime, region, tags, ...) applied beneath every service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deployment descriptor of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub pattern: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A declared dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl DependencyEdge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyEdge>,
    /// Per-environment override blocks keyed by environment name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: None,
            deployment: None,
            dependencies: Vec::new(),
            environments: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == name)
    }

    pub fn environment_override(&self, environment: &str) -> Option<&Value> {
        self.environments.get(environment)
    }

    /// Base layer document: the service without its per-environment blocks.
    pub fn to_layer_document(&self) -> Value {
        let mut doc = to_object(self);
        doc.remove("environments");
        Value::Object(doc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Availability, scaling, security and any other settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// Layer document: the environment settings without its identity.
    pub fn to_layer_document(&self) -> Value {
        Value::Object(self.extra.clone())
    }

    /// Full document, identity included.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("name".to_string(), Value::String(self.name.clone()));
        doc.extend(self.extra.clone());
        Value::Object(doc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environments: BTreeMap::new(),
            services: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn environment_override(&self, environment: &str) -> Option<&Value> {
        self.environments.get(environment)
    }

    pub fn service_override(&self, service: &str) -> Option<&Value> {
        self.services.get(service)
    }

    /// Base layer document: cloud/compliance overrides without identity or override blocks.
    pub fn to_layer_document(&self) -> Value {
        Value::Object(self.extra.clone())
    }
}

/// Conditions under which an artifact is required.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactConditions {
    /// Deployment patterns the artifact applies to. Empty means every pattern.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// An infrastructure or code deliverable implied by a deployment pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRequirement {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub conditions: ArtifactConditions,
}

fn default_required() -> bool {
    true
}

impl ArtifactRequirement {
    pub fn applies_to(&self, pattern: &str) -> bool {
        self.conditions.patterns.is_empty() || self.conditions.patterns.iter().any(|p| p == pattern)
    }

    fn same_artifact(&self, other: &ArtifactRequirement) -> bool {
        self.artifact_type == other.artifact_type && self.name == other.name
    }
}

/// Capability model: the artifacts each deployment pattern requires.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityModel {
    #[serde(default)]
    pub artifacts: Vec<ArtifactRequirement>,
}

impl CapabilityModel {
    /// Required artifacts for a pattern, deduplicated by `(type, name)`.
    pub fn required_for(&self, pattern: &str) -> Vec<&ArtifactRequirement> {
        let mut found: Vec<&ArtifactRequirement> = Vec::new();
        for artifact in self.artifacts.iter().filter(|a| a.required && a.applies_to(pattern)) {
            if !found.iter().any(|f| f.same_artifact(artifact)) {
                found.push(artifact);
            }
        }
        found
    }
}

fn to_object<T: Serialize>(entity: &T) -> Map<String, Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
