//! Resolution engine.
//!
//! Composes the layers of a service (or environment) in fixed precedence,
//! lowest first:
//! 1. system defaults
//! 2. service base document
//! 3. the service's own `environments[env]` block
//! 4. environment document
//! 5. tenant base document
//! 6. the tenant's `environments[env]` block
//! 7. the tenant's `services[name]` block
//!
//! Every layer except the service itself is optional. The dependency graph is
//! checked for cycles before anything is merged.

use crate::cache::{CacheKey, CacheSettings, ResolutionCache};
use crate::error::{ResolveError, ResolveResult};
use crate::graph::{dependency_graph, detect_cycle};
use crate::merge::{Contribution, Layer, MergeOptions, merge_layers};
use crate::store::{ConfigStore, optional};
use crate::types::{Environment, Service, System, Tenant};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Fully merged configuration of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedServiceContext {
    pub service: Value,
    /// Identifiers of the layers applied, in application order.
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Tenant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_defaults: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions: Option<Vec<Contribution>>,
}

/// Fully merged configuration of one environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEnvironmentContext {
    pub environment: Value,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Tenant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions: Option<Vec<Contribution>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverOptions {
    pub merge: MergeOptions,
    /// `None` disables result caching.
    pub cache: Option<CacheSettings>,
}

pub struct Resolver<S> {
    store: Arc<S>,
    options: ResolverOptions,
    service_cache: Option<ResolutionCache<ResolvedServiceContext>>,
    environment_cache: Option<ResolutionCache<ResolvedEnvironmentContext>>,
}

impl<S: ConfigStore> Resolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, ResolverOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: ResolverOptions) -> Self {
        Self {
            store,
            options,
            service_cache: options.cache.map(ResolutionCache::new),
            environment_cache: options.cache.map(ResolutionCache::new),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve a service, serving from the cache when enabled.
    pub async fn resolve_service_context(
        &self,
        service: &str,
        environment: Option<&str>,
        tenant: Option<&str>,
    ) -> ResolveResult<ResolvedServiceContext> {
        let key = CacheKey::service(service, environment, tenant);
        if let Some(hit) = self.service_cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(service, ?environment, ?tenant, "service context served from cache");
            return Ok(hit);
        }
        self.resolve_service_uncached(key, service, environment, tenant)
            .await
    }

    /// Resolve a service against the current store, refreshing any cached entry.
    pub async fn resolve_service_context_fresh(
        &self,
        service: &str,
        environment: Option<&str>,
        tenant: Option<&str>,
    ) -> ResolveResult<ResolvedServiceContext> {
        let key = CacheKey::service(service, environment, tenant);
        self.resolve_service_uncached(key, service, environment, tenant)
            .await
    }

    /// Resolve an environment, optionally with a tenant's per-environment block.
    pub async fn resolve_environment_context(
        &self,
        environment: &str,
        tenant: Option<&str>,
    ) -> ResolveResult<ResolvedEnvironmentContext> {
        let key = CacheKey::environment(environment, tenant);
        if let Some(hit) = self.environment_cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(environment, ?tenant, "environment context served from cache");
            return Ok(hit);
        }
        self.resolve_environment_uncached(key, environment, tenant)
            .await
    }

    pub async fn resolve_environment_context_fresh(
        &self,
        environment: &str,
        tenant: Option<&str>,
    ) -> ResolveResult<ResolvedEnvironmentContext> {
        let key = CacheKey::environment(environment, tenant);
        self.resolve_environment_uncached(key, environment, tenant)
            .await
    }

    /// Raw system document, if one exists.
    pub async fn resolve_system_context(&self) -> ResolveResult<Option<System>> {
        Ok(optional(self.store.get_system().await)?)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.service_cache {
            cache.clear();
        }
        if let Some(cache) = &self.environment_cache {
            cache.clear();
        }
    }

    async fn resolve_service_uncached(
        &self,
        key: CacheKey,
        name: &str,
        environment: Option<&str>,
        tenant_id: Option<&str>,
    ) -> ResolveResult<ResolvedServiceContext> {
        let started = Instant::now();
        debug!(service = name, ?environment, tenant = ?tenant_id, "resolving service context");

        let service = self.load_service(name).await?;
        self.ensure_acyclic(&service).await?;

        let system = optional(self.store.get_system().await)?;
        let env = match environment {
            Some(env) => optional(self.store.get_environment(env).await)?,
            None => None,
        };
        let tenant = match tenant_id {
            Some(id) => optional(self.store.get_tenant(id).await)?,
            None => None,
        };

        let system_defaults = system.and_then(|s| s.defaults);
        let mut layers = vec![
            Layer::optional("system", system_defaults.clone()),
            Layer::new(format!("service:{}", name), service.to_layer_document()),
        ];
        if let Some(env_name) = environment {
            layers.push(Layer::optional(
                format!("service:{}#env.{}", name, env_name),
                service.environment_override(env_name).cloned(),
            ));
            layers.push(Layer::optional(
                format!("environment:{}", env_name),
                env.as_ref().map(Environment::to_layer_document),
            ));
        }
        if let Some(tenant) = &tenant {
            layers.push(Layer::new(
                format!("tenant:{}", tenant.id),
                tenant.to_layer_document(),
            ));
            if let Some(env_name) = environment {
                layers.push(Layer::optional(
                    format!("tenant:{}#env.{}", tenant.id, env_name),
                    tenant.environment_override(env_name).cloned(),
                ));
            }
            layers.push(Layer::optional(
                format!("tenant:{}#service.{}", tenant.id, name),
                tenant.service_override(name).cloned(),
            ));
        }

        let outcome = merge_layers(layers, &self.options.merge);
        let resolved = ResolvedServiceContext {
            service: outcome.value,
            sources: outcome.applied,
            environment: env,
            tenant,
            system_defaults,
            contributions: outcome.contributions,
        };

        debug!(
            service = name,
            sources = ?resolved.sources,
            elapsed_us = started.elapsed().as_micros() as u64,
            "resolved service context"
        );
        if let Some(cache) = &self.service_cache {
            cache.insert(key, resolved.clone());
        }
        Ok(resolved)
    }

    async fn resolve_environment_uncached(
        &self,
        key: CacheKey,
        name: &str,
        tenant_id: Option<&str>,
    ) -> ResolveResult<ResolvedEnvironmentContext> {
        debug!(environment = name, tenant = ?tenant_id, "resolving environment context");

        let environment = match self.store.get_environment(name).await {
            Ok(environment) => environment,
            Err(err) if err.is_not_found() => {
                let available = self
                    .store
                    .get_environments()
                    .await?
                    .into_iter()
                    .map(|e| e.name)
                    .collect();
                return Err(ResolveError::EnvironmentNotFound {
                    name: name.to_string(),
                    available,
                });
            }
            Err(err) => return Err(err.into()),
        };
        let tenant = match tenant_id {
            Some(id) => optional(self.store.get_tenant(id).await)?,
            None => None,
        };

        let mut layers = vec![Layer::new(
            format!("environment:{}", name),
            environment.to_document(),
        )];
        if let Some(tenant) = &tenant {
            layers.push(Layer::optional(
                format!("tenant:{}#env.{}", tenant.id, name),
                tenant.environment_override(name).cloned(),
            ));
        }

        let outcome = merge_layers(layers, &self.options.merge);
        let resolved = ResolvedEnvironmentContext {
            environment: outcome.value,
            sources: outcome.applied,
            tenant,
            contributions: outcome.contributions,
        };
        if let Some(cache) = &self.environment_cache {
            cache.insert(key, resolved.clone());
        }
        Ok(resolved)
    }

    async fn load_service(&self, name: &str) -> ResolveResult<Service> {
        match self.store.get_service(name).await {
            Ok(service) => Ok(service),
            Err(err) if err.is_not_found() => {
                let available = self
                    .store
                    .get_services()
                    .await?
                    .into_iter()
                    .map(|s| s.name)
                    .collect();
                Err(ResolveError::ServiceNotFound {
                    name: name.to_string(),
                    available,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_acyclic(&self, service: &Service) -> Result<(), ResolveError> {
        let services = self.store.get_services().await?;
        let mut graph = dependency_graph(&services);
        // The loaded document is authoritative even if the listing raced a write.
        graph.insert(
            service.name.clone(),
            service.dependencies.iter().map(|d| d.name.clone()).collect(),
        );

        let report = detect_cycle(&service.name, &graph);
        match report.cycle {
            Some(cycle) if report.has_cycle => {
                warn!(service = %service.name, cycle = ?cycle, "refusing to resolve cyclic service");
                Err(ResolveError::CircularDependency { cycle })
            }
            _ => Ok(()),
        }
    }
}
