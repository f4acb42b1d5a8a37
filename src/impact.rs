//! Impact analysis for proposed changes.
//!
//! The analyses are pure functions over an already-loaded entity set and never
//! fail: an absence of effect is an empty result. [`ImpactAnalyzer`] loads the
//! entities from a store and delegates.

use crate::diff::{FieldChange, diff_fields};
use crate::error::StoreResult;
use crate::graph::{CycleReport, dependency_graph, direct_dependents, would_create_cycle};
use crate::store::{ConfigStore, optional};
use crate::types::{ArtifactRequirement, CapabilityModel, Service, Tenant};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Effect of deleting a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeletionImpact {
    pub service: String,
    /// Services that directly depend on the target.
    pub dependents: Vec<String>,
    pub can_delete: bool,
    pub forced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A service whose inherited configuration changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedService {
    pub service: String,
    pub changes: Vec<FieldChange>,
}

/// Effect of changing the system defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsChangeImpact {
    /// Top-level default keys whose value changed.
    pub changed_keys: Vec<String>,
    pub affected: Vec<AffectedService>,
    /// Services that override every changed field and so see no change.
    pub unaffected: Vec<String>,
}

/// Effect of switching a deployment pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternChangeImpact {
    pub old_pattern: String,
    pub new_pattern: String,
    /// Required by the new pattern only.
    pub added: Vec<ArtifactRequirement>,
    /// Required by the old pattern only.
    pub removed: Vec<ArtifactRequirement>,
    /// Required by both.
    pub unchanged: Vec<ArtifactRequirement>,
}

/// Effect of deleting an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDeletionImpact {
    pub environment: String,
    /// Services carrying an `environments[env]` block.
    pub orphaned_overrides: Vec<String>,
    /// Tenants carrying an `environments[env]` block.
    pub orphaned_tenant_overrides: Vec<String>,
}

impl EnvironmentDeletionImpact {
    pub fn is_empty(&self) -> bool {
        self.orphaned_overrides.is_empty() && self.orphaned_tenant_overrides.is_empty()
    }
}

/// Whether `target` can be deleted.
///
/// Only direct dependents are reported. With `force` the deletion is allowed
/// but the dependents are still listed.
pub fn analyze_service_deletion(
    target: &str,
    services: &[Service],
    force: bool,
) -> ServiceDeletionImpact {
    let dependents = direct_dependents(target, &dependency_graph(services));
    let blocked = !dependents.is_empty();
    let message = blocked.then(|| {
        format!(
            "Cannot delete service '{}': required by {}",
            target,
            dependents.join(", ")
        )
    });

    ServiceDeletionImpact {
        service: target.to_string(),
        can_delete: !blocked || force,
        forced: blocked && force,
        dependents,
        message,
    }
}

/// Which services see a change when the system defaults go from `old` to `new`.
///
/// Each changed field is checked against the service's own document. The
/// change is shadowed when the service sets a non-object value at the field
/// or at one of its parents, or sets the field itself while neither default
/// is an object. Sibling fields the service leaves alone still flow through.
pub fn analyze_system_defaults_change(
    services: &[Service],
    old: &Value,
    new: &Value,
) -> DefaultsChangeImpact {
    let keys: BTreeSet<&String> = old
        .as_object()
        .into_iter()
        .chain(new.as_object())
        .flat_map(|map| map.keys())
        .collect();
    let changed: Vec<(&String, Vec<FieldChange>)> = keys
        .into_iter()
        .filter_map(|key| {
            let changes = diff_fields(key, old.get(key), new.get(key));
            (!changes.is_empty()).then_some((key, changes))
        })
        .collect();

    let mut impact = DefaultsChangeImpact {
        changed_keys: changed.iter().map(|(key, _)| key.to_string()).collect(),
        ..Default::default()
    };
    if changed.is_empty() {
        return impact;
    }

    for service in services {
        let document = service.to_layer_document();
        let changes: Vec<FieldChange> = changed
            .iter()
            .flat_map(|(_, changes)| changes.iter())
            .filter(|change| !shadows_change(&document, change))
            .cloned()
            .collect();
        if changes.is_empty() {
            impact.unaffected.push(service.name.clone());
        } else {
            impact.affected.push(AffectedService {
                service: service.name.clone(),
                changes,
            });
        }
    }
    impact
}

fn shadows_change(document: &Value, change: &FieldChange) -> bool {
    let mut node = document;
    let mut segments = change.field.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(child) = node.get(segment) else {
            return false;
        };
        if !child.is_object() {
            return true;
        }
        if segments.peek().is_none() {
            return !change.old_value.is_object() && !change.new_value.is_object();
        }
        node = child;
    }
    false
}

/// Artifact delta between two deployment patterns.
pub fn analyze_deployment_pattern_change(
    capabilities: &CapabilityModel,
    old_pattern: &str,
    new_pattern: &str,
) -> PatternChangeImpact {
    let before = capabilities.required_for(old_pattern);
    let after = capabilities.required_for(new_pattern);
    PatternChangeImpact {
        old_pattern: old_pattern.to_string(),
        new_pattern: new_pattern.to_string(),
        added: after
            .iter()
            .filter(|a| !contains_artifact(&before, a))
            .map(|a| (*a).clone())
            .collect(),
        removed: before
            .iter()
            .filter(|a| !contains_artifact(&after, a))
            .map(|a| (*a).clone())
            .collect(),
        unchanged: after
            .iter()
            .filter(|a| contains_artifact(&before, a))
            .map(|a| (*a).clone())
            .collect(),
    }
}

fn contains_artifact(set: &[&ArtifactRequirement], artifact: &ArtifactRequirement) -> bool {
    set.iter()
        .any(|a| a.artifact_type == artifact.artifact_type && a.name == artifact.name)
}

/// Override blocks that become dead configuration once `environment` is removed.
pub fn analyze_environment_deletion(
    environment: &str,
    services: &[Service],
    tenants: &[Tenant],
) -> EnvironmentDeletionImpact {
    EnvironmentDeletionImpact {
        environment: environment.to_string(),
        orphaned_overrides: services
            .iter()
            .filter(|s| s.environments.contains_key(environment))
            .map(|s| s.name.clone())
            .collect(),
        orphaned_tenant_overrides: tenants
            .iter()
            .filter(|t| t.environments.contains_key(environment))
            .map(|t| t.id.clone())
            .collect(),
    }
}

/// Whether declaring `from -> to` would close a dependency cycle.
pub fn analyze_dependency_addition(from: &str, to: &str, services: &[Service]) -> CycleReport {
    would_create_cycle(from, to, &dependency_graph(services))
}

/// Runs the analyses against the entities of a store.
pub struct ImpactAnalyzer<S> {
    store: Arc<S>,
}

impl<S: ConfigStore> ImpactAnalyzer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn analyze_service_deletion(
        &self,
        service: &str,
        force: bool,
    ) -> StoreResult<ServiceDeletionImpact> {
        let services = self.store.get_services().await?;
        let impact = analyze_service_deletion(service, &services, force);
        if !impact.can_delete {
            info!(service, dependents = ?impact.dependents, "service deletion blocked");
        }
        Ok(impact)
    }

    /// Compare the stored system defaults against `new_defaults`.
    pub async fn analyze_system_defaults_change(
        &self,
        new_defaults: &Value,
    ) -> StoreResult<DefaultsChangeImpact> {
        let old_defaults = optional(self.store.get_system().await)?
            .and_then(|system| system.defaults)
            .unwrap_or(Value::Null);
        let services = self.store.get_services().await?;
        let impact = analyze_system_defaults_change(&services, &old_defaults, new_defaults);
        debug!(
            changed = ?impact.changed_keys,
            affected = impact.affected.len(),
            "analyzed system defaults change"
        );
        Ok(impact)
    }

    /// Artifact delta for moving `service` to `new_pattern`.
    ///
    /// An unknown service fails with the store's not-found error. A known
    /// service without a deployment pattern is treated as moving from the
    /// empty pattern, so only pattern-independent artifacts count as unchanged.
    pub async fn analyze_deployment_pattern_change(
        &self,
        service: &str,
        new_pattern: &str,
    ) -> StoreResult<PatternChangeImpact> {
        let old_pattern = self
            .store
            .get_service(service)
            .await?
            .deployment
            .map(|d| d.pattern)
            .unwrap_or_default();
        let capabilities = optional(self.store.get_capabilities().await)?.unwrap_or_default();
        Ok(analyze_deployment_pattern_change(
            &capabilities,
            &old_pattern,
            new_pattern,
        ))
    }

    pub async fn analyze_environment_deletion(
        &self,
        environment: &str,
    ) -> StoreResult<EnvironmentDeletionImpact> {
        let services = self.store.get_services().await?;
        let tenants = self.store.get_tenants().await?;
        Ok(analyze_environment_deletion(environment, &services, &tenants))
    }

    pub async fn analyze_dependency_addition(&self, from: &str, to: &str) -> StoreResult<CycleReport> {
        let services = self.store.get_services().await?;
        Ok(analyze_dependency_addition(from, to, &services))
    }
}
