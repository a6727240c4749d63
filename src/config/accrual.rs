//! Accrual oracle client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Where and how to reach the accrual oracle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Base URL, e.g. `http://localhost:8081`. Required at startup.
    pub address: String,
    /// Per-request deadline.
    pub timeout_ms: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            timeout_ms: 5000,
        }
    }
}

impl AccrualConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
