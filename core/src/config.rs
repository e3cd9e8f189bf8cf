use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the store directory.
pub const STORE_DIR_ENV: &str = "A3S_STORE_DIR";

/// Manifest store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the local manifest store
    pub store_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
        }
    }
}

impl StoreConfig {
    /// Configuration for an explicit store directory.
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    /// Default configuration, honouring `A3S_STORE_DIR` when set.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(STORE_DIR_ENV))
    }

    fn from_env_value(value: Option<OsString>) -> Self {
        match value {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }
}

/// `~/.a3s/manifests`, or `.a3s/manifests` when there is no home directory.
pub fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".a3s"))
        .unwrap_or_else(|| PathBuf::from(".a3s"))
        .join("manifests")
}
