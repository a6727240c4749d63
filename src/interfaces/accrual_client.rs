//! Accrual oracle client interface.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::model::OrderNumber;

/// Result type for oracle queries.
pub type Result<T> = std::result::Result<T, AccrualError>;

/// Errors that can occur while querying the oracle.
///
/// Every variant is transient from the worker's point of view: the order is
/// skipped for this tick and queried again on the next one.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Order not known to the oracle yet")]
    NoContent,

    #[error("Rate limited by the oracle (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable oracle reply: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Malformed oracle reply: {0}")]
    Malformed(String),

    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),
}

/// Order status as reported by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
    /// Any status this client does not recognize.
    Unknown,
}

impl From<String> for AccrualStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "REGISTERED" => AccrualStatus::Registered,
            "INVALID" => AccrualStatus::Invalid,
            "PROCESSING" => AccrualStatus::Processing,
            "PROCESSED" => AccrualStatus::Processed,
            _ => AccrualStatus::Unknown,
        }
    }
}

/// Oracle reply for one order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualReply {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub accrual: Option<Decimal>,
}

/// Interface for querying the accrual oracle.
///
/// Implementations:
/// - `HttpAccrualClient`: REST oracle over HTTP
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// Fetch the oracle's current view of an order.
    async fn fetch(&self, number: &OrderNumber) -> Result<AccrualReply>;
}
