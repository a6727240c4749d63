//! SQLite implementations of storage interfaces.
//!
//! One [`SqliteStore`] serves the user, order and ledger roles over a shared
//! pool so that an order's Processed flip and its ledger credit commit in the
//! same transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::StorageConfig;
use crate::storage::schema::SCHEMA;
use crate::storage::Result;

mod ledger_store;
mod order_register;
mod user_store;

/// Primary result code for "database is locked".
const SQLITE_BUSY: i32 = 5;
/// Extended result codes for primary key and unique constraint failures.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// SQLite implementation of UserStore, OrderRegister and LedgerStore.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool on the configured database file.
    ///
    /// WAL journaling lets readers proceed while a writer holds the lock;
    /// the busy timeout bounds how long a writer queues for it.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn result_code(err: &sqlx::Error) -> Option<i32> {
    err.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse().ok())
}

/// Unique or primary key violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return true;
    }
    matches!(
        result_code(err),
        Some(SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE)
    )
}

/// An append that lost to a concurrent writer.
///
/// Either the next sequence slot was already taken, or the transaction's
/// read snapshot went stale before it could take the write lock
/// (`SQLITE_BUSY` and its extended codes, e.g. `SQLITE_BUSY_SNAPSHOT`).
pub(crate) fn is_append_conflict(err: &sqlx::Error) -> bool {
    is_unique_violation(err) || result_code(err).is_some_and(|code| code & 0xff == SQLITE_BUSY)
}
