//! SQLite LedgerStore implementation.

use async_trait::async_trait;
use backon::Retryable;
use rust_decimal::Decimal;
use sea_query::{Expr, Order as SortOrder, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::{is_append_conflict, SqliteStore};
use crate::interfaces::DebitOutcome;
use crate::model::{Balance, LedgerEntry, OrderNumber, UserId, Withdrawal};
use crate::storage::helpers::{self, parse_decimal, parse_sequence, parse_user_id};
use crate::storage::schema::Ledger;
use crate::storage::{LedgerStore, Result, StorageError};
use crate::utils::retry::{conflict_backoff, is_retryable};

const ENTRY_COLUMNS: [Ledger; 7] = [
    Ledger::UserId,
    Ledger::Sequence,
    Ledger::OrderNumber,
    Ledger::Amount,
    Ledger::Balance,
    Ledger::Withdrawn,
    Ledger::ProcessedAt,
];

fn select_chain(user_id: UserId) -> SelectStatement {
    Query::select()
        .columns(ENTRY_COLUMNS)
        .from(Ledger::Table)
        .and_where(Expr::col(Ledger::UserId).eq(user_id.to_string()))
        .to_owned()
}

fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry> {
    let user_id: String = row.try_get("user_id")?;
    let sequence: i64 = row.try_get("sequence")?;
    let order: Option<String> = row.try_get("order_number")?;
    let amount: String = row.try_get("amount")?;
    let balance: String = row.try_get("balance")?;
    let withdrawn: String = row.try_get("withdrawn")?;
    let processed_at: String = row.try_get("processed_at")?;

    Ok(LedgerEntry {
        user_id: parse_user_id(&user_id)?,
        sequence: parse_sequence(sequence)?,
        order: order.map(OrderNumber::from_stored),
        amount: parse_decimal("amount", &amount)?,
        balance: parse_decimal("balance", &balance)?,
        withdrawn: parse_decimal("withdrawn", &withdrawn)?,
        processed_at: helpers::parse_timestamp(&processed_at)?,
    })
}

/// Most recent entry of a user's chain, read on the given connection.
pub(super) async fn latest_entry(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<Option<LedgerEntry>> {
    let query = select_chain(user_id)
        .order_by(Ledger::Sequence, SortOrder::Desc)
        .limit(1)
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Append an entry within an already-started transaction.
///
/// A collision on `(user_id, sequence)` or a stale read snapshot surfaces as
/// `StorageError::SequenceConflict`.
pub(super) async fn insert_entry(conn: &mut SqliteConnection, entry: &LedgerEntry) -> Result<()> {
    let query = Query::insert()
        .into_table(Ledger::Table)
        .columns(ENTRY_COLUMNS)
        .values_panic([
            entry.user_id.to_string().into(),
            i64::from(entry.sequence).into(),
            entry.order.as_ref().map(|o| o.as_str().to_string()).into(),
            entry.amount.to_string().into(),
            entry.balance.to_string().into(),
            entry.withdrawn.to_string().into(),
            helpers::format_timestamp(entry.processed_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_or_database(e, entry))?;

    Ok(())
}

fn conflict_or_database(err: sqlx::Error, entry: &LedgerEntry) -> StorageError {
    if is_append_conflict(&err) {
        StorageError::SequenceConflict {
            user_id: entry.user_id,
            sequence: entry.sequence,
        }
    } else {
        StorageError::Database(err)
    }
}

impl SqliteStore {
    /// One compare-and-append attempt.
    ///
    /// Deferred transaction: the balance read pins a snapshot, and the append
    /// can only commit if no other writer extended the chain since.
    async fn try_debit(
        &self,
        user_id: UserId,
        order: &OrderNumber,
        amount: Decimal,
    ) -> Result<DebitOutcome> {
        let mut tx = self.pool.begin().await?;

        let latest = latest_entry(&mut tx, user_id)
            .await?
            .ok_or(StorageError::ChainMissing(user_id))?;

        if latest.balance < amount {
            return Ok(DebitOutcome::InsufficientFunds {
                available: latest.balance,
            });
        }

        let entry = latest.next(Some(order.clone()), -amount, helpers::now());
        insert_entry(&mut tx, &entry).await?;
        tx.commit()
            .await
            .map_err(|e| conflict_or_database(e, &entry))?;

        Ok(DebitOutcome::Accepted(entry))
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn balance(&self, user_id: UserId) -> Result<Balance> {
        let mut conn = self.pool.acquire().await?;
        let latest = latest_entry(&mut conn, user_id)
            .await?
            .ok_or(StorageError::ChainMissing(user_id))?;
        Ok(latest.balance())
    }

    async fn debit(
        &self,
        user_id: UserId,
        order: &OrderNumber,
        amount: Decimal,
    ) -> Result<DebitOutcome> {
        if amount <= Decimal::ZERO {
            return Err(StorageError::InvalidAmount(amount));
        }

        (|| async { self.try_debit(user_id, order, amount).await })
            .retry(conflict_backoff())
            .when(is_retryable)
            .notify(|e, delay| {
                debug!(
                    user_id = %user_id,
                    order = %order,
                    error = %e,
                    delay = ?delay,
                    "Debit lost append race, re-reading balance"
                );
            })
            .await
    }

    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        let query = select_chain(user_id)
            .and_where(Expr::col(Ledger::Amount).like("-%"))
            .order_by(Ledger::Sequence, SortOrder::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut withdrawals = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(withdrawal) = entry_from_row(row)?.as_withdrawal() {
                withdrawals.push(withdrawal);
            }
        }
        Ok(withdrawals)
    }

    async fn entries(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let query = select_chain(user_id)
            .order_by(Ledger::Sequence, SortOrder::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(entry_from_row).collect()
    }
}
