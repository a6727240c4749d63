//! Abstract interfaces for loyalty components.
//!
//! These traits define the contracts for:
//! - Account storage
//! - Order ownership and status storage
//! - The per-user balance ledger
//! - The external accrual oracle

pub mod accrual_client;
pub mod ledger_store;
pub mod order_register;
pub mod store;
pub mod user_store;

pub use accrual_client::{AccrualClient, AccrualError, AccrualReply, AccrualStatus};
pub use ledger_store::{DebitOutcome, LedgerStore};
pub use order_register::OrderRegister;
pub use store::StorageError;
pub use user_store::UserStore;
