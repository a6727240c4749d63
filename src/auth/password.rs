//! bcrypt password hashing.
//!
//! bcrypt is deliberately slow, so both directions run on tokio's blocking
//! pool instead of the async workers.

/// Lowest cost bcrypt accepts; only suitable for tests.
pub const TEST_COST: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hashes and checks passwords at a fixed bcrypt cost.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn for_test() -> Self {
        Self::with_cost(TEST_COST)
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_string();
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed)
    }

    /// Check a password against a stored hash.
    ///
    /// A stored value that is not a parseable bcrypt hash never matches.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash).unwrap_or(false)
        })
        .await?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::for_test();
        let hashed = hasher.hash("pw1").await.unwrap();

        assert_ne!(hashed, "pw1");
        assert!(hasher.verify("pw1", &hashed).await.unwrap());
        assert!(!hasher.verify("pw2", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_hash_never_matches() {
        let hasher = PasswordHasher::for_test();
        assert!(!hasher.verify("pw1", "not-a-bcrypt-hash").await.unwrap());
    }
}
