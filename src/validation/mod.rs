//! Input validation for external data.
//!
//! Provides centralized validation for the fields that cross the trust
//! boundary (credentials, order numbers, withdrawal sums).

use rust_decimal::Decimal;

pub mod luhn;

/// Length limits for validated fields.
pub mod limits {
    /// Maximum login length.
    pub const MAX_LOGIN_LENGTH: usize = 256;
    /// Maximum password length (bcrypt ignores bytes past 72).
    pub const MAX_PASSWORD_LENGTH: usize = 72;
}

/// Error constants for validation failures.
pub mod errmsg {
    pub const LOGIN_EMPTY: &str = "login cannot be empty";
    pub const LOGIN_TOO_LONG: &str = "login exceeds maximum length";
    pub const PASSWORD_EMPTY: &str = "password cannot be empty";
    pub const PASSWORD_TOO_LONG: &str = "password exceeds maximum length";
    pub const AMOUNT_NOT_POSITIVE: &str = "amount must be greater than zero";
}

/// A rejected input, carrying one of the [`errmsg`] constants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

/// Validate a login.
///
/// Rules:
/// - Must not be empty
/// - Maximum 256 characters
pub fn validate_login(login: &str) -> Result<(), ValidationError> {
    if login.is_empty() {
        return Err(ValidationError(errmsg::LOGIN_EMPTY));
    }
    if login.chars().count() > limits::MAX_LOGIN_LENGTH {
        return Err(ValidationError(errmsg::LOGIN_TOO_LONG));
    }
    Ok(())
}

/// Validate a password before hashing.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError(errmsg::PASSWORD_EMPTY));
    }
    if password.len() > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError(errmsg::PASSWORD_TOO_LONG));
    }
    Ok(())
}

/// Validate a withdrawal sum.
pub fn validate_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError(errmsg::AMOUNT_NOT_POSITIVE));
    }
    Ok(())
}
