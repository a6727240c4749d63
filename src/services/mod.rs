//! Core operations consumed by a transport layer, and the background
//! reconciliation worker.

pub mod auth;
pub mod orders;
pub mod reconciler;

pub use auth::{AuthError, AuthService};
pub use orders::{OrderError, OrderService, UploadOutcome};
pub use reconciler::{ReconciliationWorker, TickReport, WorkerHandle};
