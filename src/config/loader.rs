//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::types::EngineConfig;
use crate::merge::{ArrayPolicy, deep_merge_all};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in each tier directory.
pub const CONFIG_FILE_NAME: &str = "engine.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/config-resolution/)
    Project = 1,
    /// User-level config (~/.config-resolution/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: CONFIG_RESOLUTION_USER_DIR or ~/.config-resolution
        let user_dir = std::env::var("CONFIG_RESOLUTION_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config-resolution")));

        // Project dir: CONFIG_RESOLUTION_PROJECT_DIR or $CWD/config-resolution
        let project_dir = std::env::var("CONFIG_RESOLUTION_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("config-resolution")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: EngineConfig,
    /// Tiers that contributed, lowest first.
    tiers: Vec<ConfigTier>,
    /// Files that were read, lowest tier first.
    files: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        // Explicit config path replaces the file tiers
        if let Ok(explicit_path) = std::env::var("CONFIG_RESOLUTION_CONFIG_PATH") {
            let path = PathBuf::from(&explicit_path);
            let mut config = EngineConfig::load(&path)?;
            let mut tiers = vec![ConfigTier::Project];
            if Self::apply_env_overrides(&mut config)? {
                tiers.push(ConfigTier::Environment);
            }
            return Ok(Self {
                paths,
                config,
                tiers,
                files: vec![path],
            });
        }

        let mut configs: Vec<Value> = Vec::new();
        let mut tiers = Vec::new();
        let mut files = Vec::new();

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(EngineConfig::default())?);
        tiers.push(ConfigTier::Defaults);

        // Tier 2: Project config
        if let Some(value) = read_tier(paths.project_dir.as_deref(), &mut files) {
            configs.push(value);
            tiers.push(ConfigTier::Project);
        }

        // Tier 3: User config
        if let Some(value) = read_tier(paths.user_dir.as_deref(), &mut files) {
            configs.push(value);
            tiers.push(ConfigTier::User);
        }

        let merged = deep_merge_all(configs);
        let mut config: EngineConfig = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        if Self::apply_env_overrides(&mut config)? {
            tiers.push(ConfigTier::Environment);
        }

        debug!(?tiers, ?files, "loaded engine configuration");
        Ok(Self {
            paths,
            config,
            tiers,
            files,
        })
    }

    /// Apply environment variable overrides. Returns whether any applied.
    fn apply_env_overrides(config: &mut EngineConfig) -> Result<bool> {
        let mut applied = false;

        if let Ok(policy) = std::env::var("CONFIG_RESOLUTION_ARRAY_POLICY") {
            config.resolution.array_policy = policy
                .parse::<ArrayPolicy>()
                .map_err(|e| anyhow!("CONFIG_RESOLUTION_ARRAY_POLICY: {}", e))?;
            applied = true;
        }

        if let Ok(capacity) = std::env::var("CONFIG_RESOLUTION_CACHE_CAPACITY") {
            config.cache.capacity = capacity
                .trim()
                .parse()
                .map_err(|e| anyhow!("CONFIG_RESOLUTION_CACHE_CAPACITY: {}", e))?;
            config.cache.enabled = true;
            applied = true;
        }

        if let Ok(ttl) = std::env::var("CONFIG_RESOLUTION_CACHE_TTL_SECONDS") {
            config.cache.ttl_seconds = ttl
                .trim()
                .parse()
                .map_err(|e| anyhow!("CONFIG_RESOLUTION_CACHE_TTL_SECONDS: {}", e))?;
            config.cache.enabled = true;
            applied = true;
        }

        Ok(applied)
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    pub fn tiers(&self) -> &[ConfigTier] {
        &self.tiers
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Read `engine.yaml` from a tier directory. Unreadable or malformed files are
/// skipped with a warning so one bad tier does not block the others.
fn read_tier(dir: Option<&Path>, files: &mut Vec<PathBuf>) -> Option<Value> {
    let file = dir?.join(CONFIG_FILE_NAME);
    if !file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(&file) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %file.display(), error = %err, "skipping unreadable config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            files.push(file);
            Some(value)
        }
        Err(err) => {
            warn!(path = %file.display(), error = %err, "skipping malformed config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths_discover() {
        let paths = ConfigPaths::discover();
        assert!(paths.project_dir.is_some());
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config().cache.capacity, 256);
        assert_eq!(loader.tiers()[0], ConfigTier::Defaults);
        assert!(loader.files().is_empty());
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("config-resolution");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        let project_config = r#"
resolution:
  array_policy: concat
cache:
  capacity: 10
  ttl_seconds: 30
"#;
        std::fs::write(project_dir.join(CONFIG_FILE_NAME), project_config).unwrap();

        let user_config = r#"
cache:
  capacity: 20
"#;
        std::fs::write(user_dir.join(CONFIG_FILE_NAME), user_config).unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir));
        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let config = loader.config();

        // capacity from user, ttl and array policy from project
        assert_eq!(config.cache.capacity, 20);
        assert_eq!(config.cache.ttl_seconds, 30);
        assert_eq!(config.resolution.array_policy, ArrayPolicy::Concat);
        assert_eq!(loader.files().len(), 2);
    }

    #[test]
    fn test_malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("config-resolution");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join(CONFIG_FILE_NAME), "cache: [unterminated").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config(), &EngineConfig::default());
    }
}
