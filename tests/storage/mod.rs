//! Shared storage integration tests.
//!
//! Tests the UserStore, OrderRegister and LedgerStore interfaces against all
//! implementations. Each implementation module imports these test functions
//! and runs them.

pub mod ledger_tests;
