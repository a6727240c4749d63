//! Storage configuration types.

use std::time::Duration;

use serde::Deserialize;

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path. Parent directories are created on startup.
    pub path: String,
    /// Pool size shared by request handling and the worker.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/loyalty.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
