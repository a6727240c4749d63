//! Shared storage helper functions.
//!
//! Text encodings for the values the stores persist, and their parsers, used
//! across storage backend implementations.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::model::{OrderStatus, UserId};

use super::{Result, StorageError};

/// Format a timestamp as fixed-width RFC3339 (microseconds, `Z` suffix).
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// `ORDER BY uploaded_at` listings rely on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time, truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse_timestamp(&format_timestamp(now)).unwrap_or(now)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt("timestamp", e))
}

pub fn parse_decimal(column: &'static str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| StorageError::corrupt(column, e))
}

pub fn parse_user_id(raw: &str) -> Result<UserId> {
    Uuid::parse_str(raw)
        .map(UserId)
        .map_err(|e| StorageError::corrupt("user_id", e))
}

pub fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse().map_err(|e| StorageError::corrupt("status", e))
}

pub fn parse_sequence(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|e| StorageError::corrupt("sequence", e))
}
