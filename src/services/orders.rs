//! Order upload, listing, balance and withdrawals for an authenticated user.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::interfaces::DebitOutcome;
use crate::model::{Balance, Order, OrderNumber, UserId, Withdrawal};
use crate::storage::{LedgerStore, OrderRegister, StorageError};
use crate::validation::{self, ValidationError};

/// Result of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Newly registered with status New.
    Accepted,
    /// The caller had already uploaded this number; nothing changed.
    AlreadyUploaded,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid order number: {0:?}")]
    InvalidNumber(String),

    #[error("Order {0} belongs to another user")]
    OwnedByAnotherUser(OrderNumber),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct OrderService {
    orders: Arc<dyn OrderRegister>,
    ledger: Arc<dyn LedgerStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRegister>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { orders, ledger }
    }

    fn parse_number(raw: &str) -> Result<OrderNumber, OrderError> {
        OrderNumber::parse(raw).ok_or_else(|| OrderError::InvalidNumber(raw.to_string()))
    }

    /// Register an order number for `user_id`.
    ///
    /// Re-uploading one's own number is a successful no-op; a number owned
    /// by someone else is a conflict.
    pub async fn upload_order(&self, user_id: UserId, raw: &str) -> Result<UploadOutcome, OrderError> {
        let number = Self::parse_number(raw)?;

        match self.orders.register(user_id, &number).await {
            Ok(()) => {
                info!(user_id = %user_id, order = %number, "Order uploaded");
                Ok(UploadOutcome::Accepted)
            }
            Err(StorageError::OrderExists(_)) => match self.orders.owner_of(&number).await? {
                Some(owner) if owner == user_id => Ok(UploadOutcome::AlreadyUploaded),
                Some(_) => Err(OrderError::OwnedByAnotherUser(number)),
                None => Err(StorageError::OrderExists(number).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    pub async fn get_balance(&self, user_id: UserId) -> Result<Balance, OrderError> {
        Ok(self.ledger.balance(user_id).await?)
    }

    /// Spend `sum` points against order `raw`.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        raw: &str,
        sum: Decimal,
    ) -> Result<Withdrawal, OrderError> {
        validation::validate_amount(sum)?;
        let number = Self::parse_number(raw)?;

        match self.ledger.debit(user_id, &number, sum).await? {
            DebitOutcome::Accepted(entry) => {
                debug!(
                    user_id = %user_id,
                    order = %number,
                    sum = %sum,
                    balance = %entry.balance,
                    "Withdrawal accepted"
                );
                Ok(Withdrawal {
                    order: number,
                    sum,
                    processed_at: entry.processed_at,
                })
            }
            DebitOutcome::InsufficientFunds { available } => {
                debug!(
                    user_id = %user_id,
                    order = %number,
                    sum = %sum,
                    available = %available,
                    "Withdrawal refused"
                );
                Err(OrderError::InsufficientFunds {
                    requested: sum,
                    available,
                })
            }
        }
    }

    pub async fn list_withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>, OrderError> {
        Ok(self.ledger.withdrawals(user_id).await?)
    }
}
