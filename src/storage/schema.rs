//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Users table schema.
#[derive(Iden)]
pub enum Users {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "login"]
    Login,
    #[iden = "password_hash"]
    PasswordHash,
}

/// Orders table schema.
#[derive(Iden)]
pub enum Orders {
    Table,
    #[iden = "number"]
    Number,
    #[iden = "user_id"]
    UserId,
    #[iden = "status"]
    Status,
    #[iden = "accrual"]
    Accrual,
    #[iden = "uploaded_at"]
    UploadedAt,
}

/// Ledger table schema.
#[derive(Iden)]
pub enum Ledger {
    Table,
    #[iden = "user_id"]
    UserId,
    #[iden = "sequence"]
    Sequence,
    #[iden = "order_number"]
    OrderNumber,
    #[iden = "amount"]
    Amount,
    #[iden = "balance"]
    Balance,
    #[iden = "withdrawn"]
    Withdrawn,
    #[iden = "processed_at"]
    ProcessedAt,
}

/// SQL for creating the users table.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT NOT NULL PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
)
"#;

/// SQL for creating the orders table.
pub const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    number TEXT NOT NULL PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    status TEXT NOT NULL,
    accrual TEXT,
    uploaded_at TEXT NOT NULL
)
"#;

pub const CREATE_ORDERS_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, uploaded_at)";

pub const CREATE_ORDERS_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)";

/// SQL for creating the ledger table.
///
/// Amounts are canonical decimal strings. `(user_id, sequence)` is the
/// compare-and-append key: two writers extending the same entry collide on it.
pub const CREATE_LEDGER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger (
    user_id TEXT NOT NULL REFERENCES users(id),
    sequence INTEGER NOT NULL,
    order_number TEXT,
    amount TEXT NOT NULL,
    balance TEXT NOT NULL,
    withdrawn TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    PRIMARY KEY (user_id, sequence)
)
"#;

/// At most one credit per order.
pub const CREATE_LEDGER_CREDIT_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_credit_order
    ON ledger(order_number)
    WHERE sequence > 0 AND amount NOT LIKE '-%'
"#;

/// Schema statements, applied in order. Each is idempotent.
pub const SCHEMA: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_ORDERS_TABLE,
    CREATE_ORDERS_USER_INDEX,
    CREATE_ORDERS_STATUS_INDEX,
    CREATE_LEDGER_TABLE,
    CREATE_LEDGER_CREDIT_INDEX,
];
