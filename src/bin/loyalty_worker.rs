//! loyalty-worker: accrual reconciliation process
//!
//! Opens the shared SQLite store and runs the reconciliation worker against
//! the accrual oracle until Ctrl+C.
//!
//! ## Architecture
//! ```text
//! [SQLite store] <-> [loyalty-worker] -> GET /api/orders/{number} -> [Accrual oracle]
//! ```
//!
//! ## Configuration
//! - LOYALTY_CONFIG: YAML config file (or pass the path as the first argument)
//! - LOYALTY__ACCRUAL__ADDRESS: Oracle base URL (required)
//! - LOYALTY__AUTH__SECRET / LOYALTY__AUTH__SECRET_FILE: Token signing secret (required)
//! - LOYALTY__STORAGE__PATH: Database file (default: data/loyalty.db)
//! - LOYALTY_LOG: Tracing filter (default: info)

use std::sync::Arc;

use tracing::{error, info};

use loyalty::auth::TokenAuthority;
use loyalty::clients::HttpAccrualClient;
use loyalty::config::Config;
use loyalty::services::ReconciliationWorker;
use loyalty::storage::init_storage;
use loyalty::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())
        .and_then(|config| config.validate().map(|()| config))
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?;

    info!("Starting loyalty-worker");

    // Refuse to start with a secret the request side could not sign with.
    let secret = config.auth.load_secret()?;
    let _tokens = TokenAuthority::new(&secret, config.auth.token_validity())?;
    info!("Signing secret verified");

    let stores = init_storage(&config.storage).await.map_err(|e| {
        error!(path = %config.storage.path, "Failed to open storage: {}", e);
        e
    })?;

    let oracle = HttpAccrualClient::new(&config.accrual)?;
    info!(address = %config.accrual.address, "Accrual oracle configured");

    let handle = ReconciliationWorker::new(stores.orders.clone(), Arc::new(oracle))
        .with_interval(config.worker.interval())
        .with_oracle_timeout(config.accrual.timeout())
        .spawn();

    info!("Worker running, press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    handle.stop();
    handle.join().await?;

    Ok(())
}
