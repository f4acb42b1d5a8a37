//! Error taxonomy for resolution and storage.

use crate::graph::format_cycle;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of entity held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    System,
    Service,
    Environment,
    Tenant,
    Capabilities,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::System => write!(f, "system"),
            EntityKind::Service => write!(f, "service"),
            EntityKind::Environment => write!(f, "environment"),
            EntityKind::Tenant => write!(f, "tenant"),
            EntityKind::Capabilities => write!(f, "capabilities"),
        }
    }
}

/// Errors raised by the storage collaborator. Passed through unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {label}: {message}")]
    Parse { label: String, message: String },

    #[error("{label} failed schema validation: {message}")]
    Schema { label: String, message: String },
}

impl StoreError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fatal conditions that stop a resolution call.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Service not found: {name}. Available services: {}", list_or_none(.available))]
    ServiceNotFound { name: String, available: Vec<String> },

    #[error("Environment not found: {name}. Available environments: {}", list_or_none(.available))]
    EnvironmentNotFound { name: String, available: Vec<String> },

    #[error("Circular dependency detected: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            ResolveError::EnvironmentNotFound { .. } => ErrorCode::EnvironmentNotFound,
            ResolveError::CircularDependency { .. } => ErrorCode::CircularDependency,
            ResolveError::Store(err) => match err {
                StoreError::NotFound { .. } | StoreError::Io { .. } => ErrorCode::StorageError,
                StoreError::Parse { .. } => ErrorCode::ParseError,
                StoreError::Schema { .. } => ErrorCode::SchemaError,
            },
        }
    }

    /// The offending cycle, for circular dependency errors.
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            ResolveError::CircularDependency { cycle } => Some(cycle),
            _ => None,
        }
    }
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Stable error codes surfaced verbatim to callers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Not found
    ServiceNotFound,
    EnvironmentNotFound,

    // Validation
    CircularDependency,

    // Pass-through from storage
    StorageError,
    ParseError,
    SchemaError,
}

/// Serializable error payload for protocol layers.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ResolveError> for ErrorReport {
    fn from(err: &ResolveError) -> Self {
        let details = match err {
            ResolveError::ServiceNotFound { available, .. }
            | ResolveError::EnvironmentNotFound { available, .. } => {
                Some(json!({ "available": available }))
            }
            ResolveError::CircularDependency { cycle } => Some(json!({ "cycle": cycle })),
            ResolveError::Store(_) => None,
        };
        Self {
            code: err.code(),
            message: err.to_string(),
            details,
        }
    }
}
