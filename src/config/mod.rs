//! Engine configuration.
//!
//! Consolidates configuration from four tiers with field-by-field YAML merging:
//! 1. **Defaults** - `EngineConfig::default()`
//! 2. **Project** - `$CWD/config-resolution/engine.yaml`
//! 3. **User** - `~/.config-resolution/engine.yaml`
//! 4. **Environment** - environment variables
//!
//! ## Environment Variables
//! - `CONFIG_RESOLUTION_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `CONFIG_RESOLUTION_PROJECT_DIR` - Project config dir (default: `./config-resolution`)
//! - `CONFIG_RESOLUTION_USER_DIR` - User config dir (default: `~/.config-resolution`)
//! - `CONFIG_RESOLUTION_ARRAY_POLICY` - `replace` or `concat`
//! - `CONFIG_RESOLUTION_CACHE_CAPACITY` - Cache capacity (enables the cache)
//! - `CONFIG_RESOLUTION_CACHE_TTL_SECONDS` - Cache TTL (enables the cache)

mod loader;
mod types;

pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ConfigPaths, ConfigTier};
pub use types::*;
