//! LedgerStore trait definition.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::store::Result;
use crate::model::{Balance, LedgerEntry, OrderNumber, UserId, Withdrawal};

/// Outcome of a conditional debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The debit entry that was appended.
    Accepted(LedgerEntry),
    /// Nothing was appended; `available` is the balance the check saw.
    InsufficientFunds { available: Decimal },
}

/// Interface for the per-user append-only balance chain.
///
/// Each user's chain starts with the sequence-0 entry written at
/// registration. Entries are never updated or removed; the most recent
/// entry carries the current balance and withdrawn total.
///
/// Credits are not exposed here: they only happen together with an order
/// becoming Processed, see `OrderRegister::apply_accrual`.
///
/// Implementations:
/// - `SqliteStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Balance from the most recent entry.
    async fn balance(&self, user_id: UserId) -> Result<Balance>;

    /// Append `-amount` if the latest balance covers it.
    ///
    /// The check and the append are atomic against concurrent writers for
    /// the same user. A lost append race re-reads the chain; if the winner
    /// left too little, the outcome is `InsufficientFunds`.
    async fn debit(
        &self,
        user_id: UserId,
        order: &OrderNumber,
        amount: Decimal,
    ) -> Result<DebitOutcome>;

    /// Debit entries, oldest first.
    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>>;

    /// The full chain in sequence order.
    async fn entries(&self, user_id: UserId) -> Result<Vec<LedgerEntry>>;
}
