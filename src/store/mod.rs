//! Storage collaborator interface.
//!
//! The engine only reads through this trait. Writes, physical layout and
//! per-document schema validation belong to the implementor.

mod memory;

pub use memory::MemoryStore;

use crate::error::{StoreError, StoreResult};
use crate::types::{CapabilityModel, Environment, Service, System, Tenant};
use async_trait::async_trait;

/// Read access to the entity set.
///
/// Every getter returns [`StoreError::NotFound`] when the entity is absent.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_system(&self) -> StoreResult<System>;

    async fn get_service(&self, name: &str) -> StoreResult<Service>;

    async fn get_services(&self) -> StoreResult<Vec<Service>>;

    async fn get_environment(&self, name: &str) -> StoreResult<Environment>;

    async fn get_environments(&self) -> StoreResult<Vec<Environment>>;

    async fn get_tenant(&self, id: &str) -> StoreResult<Tenant>;

    async fn get_tenants(&self) -> StoreResult<Vec<Tenant>>;

    async fn get_capabilities(&self) -> StoreResult<CapabilityModel>;
}

/// Turn a not-found result into `None`, keeping every other error.
pub(crate) fn optional<T>(result: StoreResult<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}
