//! Demo-binary configuration.
//!
//! The library API (`RepositoryManager::new`) takes plain constructor
//! arguments, not a config struct — this module is glue for the `repovault`
//! binary, loading a YAML file the way the teacher's `Config::from_yaml`
//! does.
//!
//! ```yaml
//! root: ./state
//! cache_path: ./cache
//! cache_local_packages: false
//! max_concurrent_operations: 8
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RepoVaultError, Result};

/// Configuration for the demo binary's `RepositoryManager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryManagerConfig {
    /// Manager root directory, where clones and the catalog file live.
    pub root: PathBuf,
    /// Optional shared cache directory.
    pub cache_path: Option<PathBuf>,
    /// Whether local (non-URL) specifiers should also populate the cache.
    pub cache_local_packages: bool,
    /// Bound on concurrent provider operations; unbounded if `None`.
    pub max_concurrent_operations: Option<usize>,
}

impl Default for RepositoryManagerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./repovault-state"),
            cache_path: None,
            cache_local_packages: false,
            max_concurrent_operations: Some(8),
        }
    }
}

impl RepositoryManagerConfig {
    /// Load configuration from a YAML file, falling back to defaults for
    /// any field the file omits.
    pub fn from_yaml(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RepoVaultError::io(path, e))?;
        serde_yaml::from_str(&content).map_err(|e| RepoVaultError::catalog_corrupt(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_root() {
        let config = RepositoryManagerConfig::default();
        assert_eq!(config.root, PathBuf::from("./repovault-state"));
        assert_eq!(config.max_concurrent_operations, Some(8));
    }
}
