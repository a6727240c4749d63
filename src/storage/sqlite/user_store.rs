//! SQLite UserStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::Row;

use super::{is_unique_violation, ledger_store, SqliteStore};
use crate::model::{LedgerEntry, User, UserId};
use crate::storage::helpers::{self, parse_user_id};
use crate::storage::schema::Users;
use crate::storage::{Result, StorageError, UserStore};

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let user_id = UserId::new();

        // The user row goes first so the transaction holds the write lock
        // from its first statement on.
        let mut tx = self.pool.begin().await?;

        let query = Query::insert()
            .into_table(Users::Table)
            .columns([Users::Id, Users::Login, Users::PasswordHash])
            .values_panic([
                user_id.to_string().into(),
                login.into(),
                password_hash.into(),
            ])
            .to_string(SqliteQueryBuilder);

        if let Err(e) = sqlx::query(&query).execute(&mut *tx).await {
            if is_unique_violation(&e) {
                return Err(StorageError::LoginTaken(login.to_string()));
            }
            return Err(e.into());
        }

        ledger_store::insert_entry(&mut tx, &LedgerEntry::genesis(user_id, helpers::now())).await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let query = Query::select()
            .columns([Users::Id, Users::Login, Users::PasswordHash])
            .from(Users::Table)
            .and_where(Expr::col(Users::Login).eq(login))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                Ok(Some(User {
                    id: parse_user_id(&id)?,
                    login: row.try_get("login")?,
                    password_hash: row.try_get("password_hash")?,
                }))
            }
            None => Ok(None),
        }
    }
}
