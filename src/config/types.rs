//! Engine configuration types.

use crate::cache::CacheSettings;
use crate::merge::{ArrayPolicy, MergeOptions};
use crate::resolver::ResolverOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// How layers are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Array policy: `replace` (default) or `concat`.
    #[serde(default)]
    pub array_policy: ArrayPolicy,

    /// Attach per-leaf contributions to resolved results.
    #[serde(default)]
    pub track_provenance: bool,
}

/// Resolution result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disabled by default: cached results are never invalidated on writes.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    60
}

impl EngineConfig {
    /// Load a single configuration file, without tier merging.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            array_policy: self.resolution.array_policy,
            track_provenance: self.resolution.track_provenance,
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            merge: self.merge_options(),
            cache: self.cache.enabled.then(|| CacheSettings {
                capacity: self.cache.capacity,
                ttl: Duration::from_secs(self.cache.ttl_seconds),
            }),
        }
    }
}
