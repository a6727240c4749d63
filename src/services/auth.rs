//! Account registration, login and token verification.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{PasswordError, PasswordHasher, TokenAuthority, TokenError};
use crate::model::{Token, UserId};
use crate::storage::{StorageError, UserStore};
use crate::validation::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Login already registered: {0}")]
    DuplicateLogin(String),

    /// Unknown login and wrong password both land here.
    #[error("Invalid login or password")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid token: {0}")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LoginTaken(login) => AuthError::DuplicateLogin(login),
            other => AuthError::Storage(other),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenAuthority,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenAuthority) -> Self {
        Self {
            users,
            hasher: PasswordHasher::default(),
            tokens,
        }
    }

    /// Use a specific hasher, e.g. a cheap one in tests.
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Create an account and return a token for it.
    pub async fn register_user(&self, login: &str, password: &str) -> Result<Token, AuthError> {
        validation::validate_login(login)?;
        validation::validate_password(password)?;

        let hash = self.hasher.hash(password).await?;
        let user_id = self.users.create_user(login, &hash).await?;

        info!(user_id = %user_id, "User registered");
        Ok(self.tokens.issue(user_id))
    }

    pub async fn authenticate_user(&self, login: &str, password: &str) -> Result<Token, AuthError> {
        let Some(user) = self.users.find_by_login(login).await? else {
            debug!("Login attempt for unknown user");
            return Err(AuthError::Unauthorized);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::Unauthorized);
        }

        Ok(self.tokens.issue(user.id))
    }

    pub fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        Ok(self.tokens.verify(token)?)
    }
}
