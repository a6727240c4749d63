//! Domain types shared by storage, services and the reconciliation worker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::validation::luhn;

/// Opaque user identifier, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    /// bcrypt hash string.
    pub password_hash: String,
}

/// A Luhn-valid order number.
///
/// Values only come into existence through [`OrderNumber::parse`] (or from
/// rows that were validated on the way in), so holders never re-check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Validate and wrap a raw order number.
    ///
    /// Returns `None` for empty input, non-digit characters or a failed
    /// checksum.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !luhn::is_valid(raw) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Wrap a number read back from storage.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an uploaded order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Invalid,
        OrderStatus::Processed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// Invalid and Processed admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::New, OrderStatus::Processing)
                | (
                    OrderStatus::New | OrderStatus::Processing,
                    OrderStatus::Invalid | OrderStatus::Processed
                )
        )
    }

    /// States from which `self` may be entered.
    pub fn sources(&self) -> Vec<OrderStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(*self))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for status strings that name no known state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An order as listed back to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub number: OrderNumber,
    pub status: OrderStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

/// An order still awaiting a terminal outcome from the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub user_id: UserId,
}

/// Current balance and lifetime withdrawn total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

/// One immutable link of a user's balance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub sequence: u32,
    pub order: Option<OrderNumber>,
    /// Signed: credits positive, debits negative.
    pub amount: Decimal,
    pub balance: Decimal,
    pub withdrawn: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The sequence-0 entry every chain starts from.
    pub fn genesis(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            sequence: 0,
            order: None,
            amount: Decimal::ZERO,
            balance: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            processed_at: at,
        }
    }

    /// Entry appending `amount` on top of `self`.
    ///
    /// Debits (negative amounts) add their magnitude to `withdrawn`.
    pub fn next(&self, order: Option<OrderNumber>, amount: Decimal, at: DateTime<Utc>) -> Self {
        let withdrawn = if amount.is_sign_negative() {
            self.withdrawn + amount.abs()
        } else {
            self.withdrawn
        };
        Self {
            user_id: self.user_id,
            sequence: self.sequence + 1,
            order,
            amount,
            balance: self.balance + amount,
            withdrawn,
            processed_at: at,
        }
    }

    pub fn balance(&self) -> Balance {
        Balance {
            current: self.balance,
            withdrawn: self.withdrawn,
        }
    }

    /// Projection for debit entries; `None` for credits and genesis.
    pub fn as_withdrawal(&self) -> Option<Withdrawal> {
        if !self.amount.is_sign_negative() || self.amount.is_zero() {
            return None;
        }
        Some(Withdrawal {
            order: self.order.clone()?,
            sum: self.amount.abs(),
            processed_at: self.processed_at,
        })
    }
}

/// A debit projected for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub order: OrderNumber,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Signed bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
