//! In-process store.

use super::ConfigStore;
use crate::error::{EntityKind, StoreError, StoreResult};
use crate::types::{CapabilityModel, Environment, Service, System, Tenant};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Entities {
    system: Option<System>,
    services: BTreeMap<String, Service>,
    environments: BTreeMap<String, Environment>,
    tenants: BTreeMap<String, Tenant>,
    capabilities: Option<CapabilityModel>,
}

/// Entity set held in memory. Writes are last-writer-wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<Entities>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(self, system: System) -> Self {
        self.put_system(system);
        self
    }

    pub fn with_service(self, service: Service) -> Self {
        self.put_service(service);
        self
    }

    pub fn with_environment(self, environment: Environment) -> Self {
        self.put_environment(environment);
        self
    }

    pub fn with_tenant(self, tenant: Tenant) -> Self {
        self.put_tenant(tenant);
        self
    }

    pub fn with_capabilities(self, capabilities: CapabilityModel) -> Self {
        self.put_capabilities(capabilities);
        self
    }

    pub fn put_system(&self, system: System) {
        self.write().system = Some(system);
    }

    pub fn put_service(&self, service: Service) {
        self.write().services.insert(service.name.clone(), service);
    }

    pub fn put_environment(&self, environment: Environment) {
        self.write()
            .environments
            .insert(environment.name.clone(), environment);
    }

    pub fn put_tenant(&self, tenant: Tenant) {
        self.write().tenants.insert(tenant.id.clone(), tenant);
    }

    pub fn put_capabilities(&self, capabilities: CapabilityModel) {
        self.write().capabilities = Some(capabilities);
    }

    pub fn remove_system(&self) -> Option<System> {
        self.write().system.take()
    }

    pub fn remove_service(&self, name: &str) -> Option<Service> {
        self.write().services.remove(name)
    }

    pub fn remove_environment(&self, name: &str) -> Option<Environment> {
        self.write().environments.remove(name)
    }

    pub fn remove_tenant(&self, id: &str) -> Option<Tenant> {
        self.write().tenants.remove(id)
    }

    fn read(&self) -> RwLockReadGuard<'_, Entities> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entities> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_system(&self) -> StoreResult<System> {
        self.read()
            .system
            .clone()
            .ok_or_else(|| StoreError::not_found(EntityKind::System, "system"))
    }

    async fn get_service(&self, name: &str) -> StoreResult<Service> {
        self.read()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Service, name))
    }

    async fn get_services(&self) -> StoreResult<Vec<Service>> {
        Ok(self.read().services.values().cloned().collect())
    }

    async fn get_environment(&self, name: &str) -> StoreResult<Environment> {
        self.read()
            .environments
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Environment, name))
    }

    async fn get_environments(&self) -> StoreResult<Vec<Environment>> {
        Ok(self.read().environments.values().cloned().collect())
    }

    async fn get_tenant(&self, id: &str) -> StoreResult<Tenant> {
        self.read()
            .tenants
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Tenant, id))
    }

    async fn get_tenants(&self) -> StoreResult<Vec<Tenant>> {
        Ok(self.read().tenants.values().cloned().collect())
    }

    async fn get_capabilities(&self) -> StoreResult<CapabilityModel> {
        self.read()
            .capabilities
            .clone()
            .ok_or_else(|| StoreError::not_found(EntityKind::Capabilities, "capabilities"))
    }
}
