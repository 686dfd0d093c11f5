//! prefvault configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main prefvault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Service name used to scope secret-tier keys
    pub service_name: String,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background reconciliation configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            service_name: "prefvault".to_string(),
            storage: StorageConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Background reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum concurrent repair tasks
    pub max_concurrent: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Default database path (~/.prefvault/profiles.db)
fn default_db_path() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".prefvault")
        .join("profiles.db")
}

impl VaultConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
