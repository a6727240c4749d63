//! Storage error shared by every store trait.

use crate::model::{OrderNumber, OrderStatus, UserId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Login already registered: {0}")]
    LoginTaken(String),

    #[error("Order already registered: {0}")]
    OrderExists(OrderNumber),

    #[error("Ledger chain missing for user {0}")]
    ChainMissing(UserId),

    #[error("Sequence conflict: user={user_id}, sequence={sequence}")]
    SequenceConflict { user_id: UserId, sequence: u32 },

    #[error("Amount not allowed here: {0}")]
    InvalidAmount(rust_decimal::Decimal),

    #[error("Transition to {to} needs a dedicated operation: order={number}")]
    InvalidTransition { number: OrderNumber, to: OrderStatus },

    #[error("Corrupt stored value in {column}: {message}")]
    Corrupt {
        column: &'static str,
        message: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    pub(crate) fn corrupt(column: &'static str, err: impl std::fmt::Display) -> Self {
        StorageError::Corrupt {
            column,
            message: err.to_string(),
        }
    }
}
