//! Loyalty - points backend for purchase orders.
//!
//! Users upload order numbers, an external accrual oracle rates them, and a
//! per-user append-only ledger tracks the resulting points balance and the
//! withdrawals spent against it.

pub mod auth;
pub mod clients;
pub mod config;
pub mod interfaces;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;
pub mod validation;
