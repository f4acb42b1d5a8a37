//! Hierarchical configuration resolution for services across environments
//! and tenants.
//!
//! - [`merge`] composes labeled layers with provenance
//! - [`graph`] keeps the service dependency graph acyclic
//! - [`resolver`] resolves a service or environment in fixed precedence
//! - [`impact`] explains the downstream effects of proposed changes

pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod impact;
pub mod logging;
pub mod merge;
pub mod resolver;
pub mod store;
pub mod types;

pub use error::{ErrorCode, ErrorReport, ResolveError, StoreError};
pub use graph::{CycleReport, detect_cycle, would_create_cycle};
pub use impact::ImpactAnalyzer;
pub use merge::{ArrayPolicy, Layer, MergeOptions, merge_layers};
pub use resolver::{ResolvedEnvironmentContext, ResolvedServiceContext, Resolver, ResolverOptions};
pub use store::{ConfigStore, MemoryStore};
