//! External service clients.

pub mod accrual;
pub mod mock;

pub use accrual::HttpAccrualClient;
pub use mock::{MockAccrualClient, ScriptedReply};
