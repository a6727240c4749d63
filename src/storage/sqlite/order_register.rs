//! SQLite OrderRegister implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_query::{Expr, OnConflict, Order as SortOrder, Query, SqliteQueryBuilder};
use sqlx::Row;

use super::{ledger_store, SqliteStore};
use crate::model::{LedgerEntry, Order, OrderNumber, OrderStatus, PendingOrder, UserId};
use crate::storage::helpers::{self, parse_decimal, parse_status, parse_user_id};
use crate::storage::schema::Orders;
use crate::storage::{OrderRegister, Result, StorageError};

fn status_texts(statuses: &[OrderStatus]) -> Vec<&'static str> {
    statuses.iter().map(OrderStatus::as_str).collect()
}

#[async_trait]
impl OrderRegister for SqliteStore {
    async fn register(&self, user_id: UserId, number: &OrderNumber) -> Result<()> {
        let query = Query::insert()
            .into_table(Orders::Table)
            .columns([
                Orders::Number,
                Orders::UserId,
                Orders::Status,
                Orders::UploadedAt,
            ])
            .values_panic([
                number.as_str().into(),
                user_id.to_string().into(),
                OrderStatus::New.as_str().into(),
                helpers::format_timestamp(helpers::now()).into(),
            ])
            .on_conflict(OnConflict::column(Orders::Number).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::OrderExists(number.clone()));
        }
        Ok(())
    }

    async fn owner_of(&self, number: &OrderNumber) -> Result<Option<UserId>> {
        let query = Query::select()
            .column(Orders::UserId)
            .from(Orders::Table)
            .and_where(Expr::col(Orders::Number).eq(number.as_str()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => {
                let user_id: String = row.try_get("user_id")?;
                Ok(Some(parse_user_id(&user_id)?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let query = Query::select()
            .columns([
                Orders::Number,
                Orders::Status,
                Orders::Accrual,
                Orders::UploadedAt,
            ])
            .from(Orders::Table)
            .and_where(Expr::col(Orders::UserId).eq(user_id.to_string()))
            .order_by(Orders::UploadedAt, SortOrder::Asc)
            .order_by(Orders::Number, SortOrder::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let accrual: Option<String> = row.try_get("accrual")?;
            let uploaded_at: String = row.try_get("uploaded_at")?;
            orders.push(Order {
                number: OrderNumber::from_stored(row.try_get("number")?),
                status: parse_status(&status)?,
                accrual: accrual
                    .as_deref()
                    .map(|a| parse_decimal("accrual", a))
                    .transpose()?,
                uploaded_at: helpers::parse_timestamp(&uploaded_at)?,
            });
        }

        Ok(orders)
    }

    async fn list_pending(&self) -> Result<Vec<PendingOrder>> {
        let terminal = status_texts(&[OrderStatus::Invalid, OrderStatus::Processed]);

        let query = Query::select()
            .columns([Orders::Number, Orders::Status, Orders::UserId])
            .from(Orders::Table)
            .and_where(Expr::col(Orders::Status).is_not_in(terminal))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let user_id: String = row.try_get("user_id")?;
            pending.push(PendingOrder {
                number: OrderNumber::from_stored(row.try_get("number")?),
                status: parse_status(&status)?,
                user_id: parse_user_id(&user_id)?,
            });
        }

        Ok(pending)
    }

    async fn apply_status(&self, number: &OrderNumber, status: OrderStatus) -> Result<bool> {
        let sources = status.sources();
        if status == OrderStatus::Processed || sources.is_empty() {
            return Err(StorageError::InvalidTransition {
                number: number.clone(),
                to: status,
            });
        }

        let query = Query::update()
            .table(Orders::Table)
            .values([(Orders::Status, status.as_str().into())])
            .and_where(Expr::col(Orders::Number).eq(number.as_str()))
            .and_where(Expr::col(Orders::Status).is_in(status_texts(&sources)))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        accrual: Decimal,
    ) -> Result<Option<LedgerEntry>> {
        if accrual.is_sign_negative() {
            return Err(StorageError::InvalidAmount(accrual));
        }

        // The conditional status flip runs first: it takes the write lock and
        // decides, under that lock, whether this call credits at all.
        let mut tx = self.pool.begin().await?;

        let flip = Query::update()
            .table(Orders::Table)
            .values([
                (Orders::Status, OrderStatus::Processed.as_str().into()),
                (Orders::Accrual, accrual.to_string().into()),
            ])
            .and_where(Expr::col(Orders::Number).eq(number.as_str()))
            .and_where(
                Expr::col(Orders::Status).is_in(status_texts(&OrderStatus::Processed.sources())),
            )
            .returning_col(Orders::UserId)
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&flip).fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };
        let user_id: String = row.try_get("user_id")?;
        let user_id = parse_user_id(&user_id)?;

        let latest = ledger_store::latest_entry(&mut tx, user_id)
            .await?
            .ok_or(StorageError::ChainMissing(user_id))?;
        let credit = latest.next(Some(number.clone()), accrual, helpers::now());
        ledger_store::insert_entry(&mut tx, &credit).await?;

        tx.commit().await?;
        Ok(Some(credit))
    }
}
