//! Reconciliation worker configuration.

use std::time::Duration;

use serde::Deserialize;

/// How often the worker drains pending orders.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl WorkerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
