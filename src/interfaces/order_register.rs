//! OrderRegister trait definition.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::store::Result;
use crate::model::{LedgerEntry, Order, OrderNumber, OrderStatus, PendingOrder, UserId};

/// Interface for order ownership and status storage.
///
/// Status only moves forward (see `OrderStatus::can_transition_to`). Both
/// apply operations are conditional on the current status: an update that
/// would revisit a terminal state, or repeat one already applied, is a no-op
/// reported as `false` / `None`.
///
/// Implementations:
/// - `SqliteStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait OrderRegister: Send + Sync {
    /// Insert the order with status `New` if the number is free.
    ///
    /// Fails with `StorageError::OrderExists` on collision, regardless of
    /// who owns the existing row.
    async fn register(&self, user_id: UserId, number: &OrderNumber) -> Result<()>;

    /// Owner of an order, if registered.
    async fn owner_of(&self, number: &OrderNumber) -> Result<Option<UserId>>;

    /// A user's orders, oldest upload first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Snapshot of every order not yet Invalid or Processed.
    async fn list_pending(&self) -> Result<Vec<PendingOrder>>;

    /// Move an order to `Processing` or `Invalid`.
    ///
    /// `Processed` is rejected with `StorageError::InvalidTransition`: it
    /// carries a credit and must go through [`OrderRegister::apply_accrual`].
    /// Returns whether the row changed.
    async fn apply_status(&self, number: &OrderNumber, status: OrderStatus) -> Result<bool>;

    /// Mark an order `Processed` with its accrual and credit the owner's
    /// ledger, as one atomic unit.
    ///
    /// Returns the appended credit entry, or `None` when the order was
    /// already terminal (or unknown) and nothing was written.
    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        accrual: Decimal,
    ) -> Result<Option<LedgerEntry>>;
}
