//! Capacity- and time-bounded memo of resolution results.
//!
//! Entries are never invalidated by writes to the store. Callers that need
//! strict freshness bypass the cache or configure a short TTL.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of entries kept.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Lifetime of an entry.
    #[serde(default = "default_ttl", with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl: default_ttl(),
        }
    }
}

fn default_capacity() -> usize {
    256
}

fn default_ttl() -> Duration {
    Duration::from_secs(60)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Parameters of a resolution call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Service {
        name: String,
        environment: Option<String>,
        tenant: Option<String>,
    },
    Environment {
        name: String,
        tenant: Option<String>,
    },
}

impl CacheKey {
    pub fn service(name: &str, environment: Option<&str>, tenant: Option<&str>) -> Self {
        Self::Service {
            name: name.to_string(),
            environment: environment.map(str::to_string),
            tenant: tenant.map(str::to_string),
        }
    }

    pub fn environment(name: &str, tenant: Option<&str>) -> Self {
        Self::Environment {
            name: name.to_string(),
            tenant: tenant.map(str::to_string),
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// Least-recently-used cache with a per-entry TTL.
///
/// A capacity of zero disables storage entirely.
pub struct ResolutionCache<V> {
    settings: CacheSettings,
    entries: Option<Mutex<LruCache<CacheKey, Entry<V>>>>,
}

impl<V: Clone> ResolutionCache<V> {
    pub fn new(settings: CacheSettings) -> Self {
        let entries = NonZeroUsize::new(settings.capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { settings, entries }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Cached value for `key`, if present and not expired. A hit marks the
    /// entry as most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.lock()?;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(self.settings.ttl) {
                return Some(entry.value.clone());
            }
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        if let Some(mut entries) = self.lock() {
            entries.put(
                key,
                Entry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn clear(&self) {
        if let Some(mut entries) = self.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<CacheKey, Entry<V>>>> {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
