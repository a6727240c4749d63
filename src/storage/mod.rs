//! Storage implementations.

use std::sync::Arc;

#[cfg(feature = "sqlite")]
use tracing::info;

pub use crate::config::StorageConfig;
pub use crate::interfaces::store::{Result, StorageError};
pub use crate::interfaces::{LedgerStore, OrderRegister, UserStore};

pub mod helpers;
pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use mock::MockStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The three store roles, typically backed by one shared implementation.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderRegister>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Stores {
    /// Use one store for every role.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + OrderRegister + LedgerStore + 'static,
    {
        Self {
            users: store.clone(),
            orders: store.clone(),
            ledger: store,
        }
    }
}

/// Initialize storage based on configuration.
///
/// Opens (creating if missing) the SQLite database at the configured path,
/// applies the schema and returns the stores over a shared pool.
#[cfg(feature = "sqlite")]
pub async fn init_storage(config: &StorageConfig) -> Result<Stores> {
    info!(path = %config.path, "Storage: sqlite");

    if let Some(parent) = std::path::Path::new(&config.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("create {}: {}", parent.display(), e)))?;
        }
    }

    let store = SqliteStore::connect(config).await?;
    store.init().await?;

    Ok(Stores::shared(Arc::new(store)))
}
