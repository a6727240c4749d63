//! HMAC-signed bearer tokens.
//!
//! A token is the lower-case hex encoding of
//! `user_id (16 bytes) || expiry (8 bytes, big-endian unix seconds) || mac`,
//! where `mac` is HMAC-SHA256 over the first 24 bytes. Tokens are
//! self-contained: verifying one needs only the secret.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::model::{Token, UserId};

type HmacSha256 = Hmac<Sha256>;

const PAYLOAD_LEN: usize = 16 + 8;
const MAC_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Signing secret must not be empty")]
    EmptySecret,
}

/// Issues and verifies tokens under one secret.
#[derive(Clone)]
pub struct TokenAuthority {
    mac: HmacSha256,
    validity: Duration,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: &[u8], validity: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::EmptySecret)?;
        Ok(Self { mac, validity })
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn issue(&self, user_id: UserId) -> Token {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Token {
        let validity = i64::try_from(self.validity.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(validity);

        let mut bytes = Vec::with_capacity(PAYLOAD_LEN + MAC_LEN);
        bytes.extend_from_slice(user_id.0.as_bytes());
        bytes.extend_from_slice(&expires_at.to_be_bytes());

        let mut mac = self.mac.clone();
        mac.update(&bytes);
        bytes.extend_from_slice(&mac.finalize().into_bytes());

        Token(hex::encode(bytes))
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Checks run in order: encoding, length, expiry, signature. The
    /// signature comparison is constant-time.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let bytes = hex::decode(token).map_err(|_| TokenError::Malformed)?;
        if bytes.len() != PAYLOAD_LEN + MAC_LEN {
            return Err(TokenError::Malformed);
        }
        let (payload, signature) = bytes.split_at(PAYLOAD_LEN);
        let (user_bytes, expiry_bytes) = payload.split_at(16);

        let mut expiry = [0u8; 8];
        expiry.copy_from_slice(expiry_bytes);
        if now.timestamp() > i64::from_be_bytes(expiry) {
            return Err(TokenError::Expired);
        }

        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let user_id = Uuid::from_slice(user_bytes).map_err(|_| TokenError::Malformed)?;
        Ok(UserId(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn authority(secret: &[u8]) -> TokenAuthority {
        TokenAuthority::new(secret, DAY).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let auth = authority(b"secret");
        let user = UserId::new();
        let token = auth.issue(user);

        assert_eq!(token.as_str().len(), (PAYLOAD_LEN + MAC_LEN) * 2);
        assert!(token.as_str().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(auth.verify(token.as_str()), Ok(user));
    }

    #[test]
    fn test_expired_token() {
        let auth = authority(b"secret");
        let issued = Utc::now() - chrono::Duration::days(2);
        let token = auth.issue_at(UserId::new(), issued);

        assert_eq!(auth.verify(token.as_str()), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_boundary() {
        let auth = authority(b"secret");
        let user = UserId::new();
        let issued = Utc::now();
        let token = auth.issue_at(user, issued);

        let at_expiry = issued + chrono::Duration::seconds(DAY.as_secs() as i64);
        let just_after = at_expiry + chrono::Duration::seconds(1);
        assert_eq!(auth.verify_at(token.as_str(), at_expiry), Ok(user));
        assert_eq!(
            auth.verify_at(token.as_str(), just_after),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_token() {
        let auth = authority(b"secret");
        let token = auth.issue(UserId::new()).0;

        // Flip one nibble of the user id.
        let first = if token.starts_with('0') { "1" } else { "0" };
        let tampered = format!("{}{}", first, &token[1..]);
        assert_eq!(
            auth.verify(&tampered),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_secret_rejects() {
        let token = authority(b"secret").issue(UserId::new());
        assert_eq!(
            authority(b"other").verify(token.as_str()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let auth = authority(b"secret");
        assert_eq!(auth.verify(""), Err(TokenError::Malformed));
        assert_eq!(auth.verify("xyz"), Err(TokenError::Malformed));
        assert_eq!(auth.verify("abcd"), Err(TokenError::Malformed));

        let token = auth.issue(UserId::new()).0;
        assert_eq!(auth.verify(&token[..token.len() - 2]), Err(TokenError::Malformed));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            TokenAuthority::new(b"", DAY).unwrap_err(),
            TokenError::EmptySecret
        );
    }
}
