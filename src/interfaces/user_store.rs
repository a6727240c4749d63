//! UserStore trait definition.

use async_trait::async_trait;

use super::store::Result;
use crate::model::{User, UserId};

/// Interface for account persistence.
///
/// Implementations:
/// - `SqliteStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account and its sequence-0 ledger entry as one unit.
    ///
    /// Fails with `StorageError::LoginTaken` when the login exists; nothing
    /// is written in that case.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<UserId>;

    /// Look up an account by login.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
}
