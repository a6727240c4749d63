//! Token signing configuration.

use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Default token validity: 72 hours.
pub const DEFAULT_TOKEN_VALIDITY_SECS: u64 = 72 * 60 * 60;

/// Signing secret source and token lifetime.
///
/// The secret comes either inline or from a file; the file wins when both
/// are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: Option<String>,
    pub secret_file: Option<String>,
    pub token_validity_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_file: None,
            token_validity_secs: DEFAULT_TOKEN_VALIDITY_SECS,
        }
    }
}

impl AuthConfig {
    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_validity_secs)
    }

    pub fn has_secret(&self) -> bool {
        self.secret_file.is_some() || self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Resolve the signing secret bytes.
    ///
    /// A trailing newline in the secret file is not part of the secret.
    pub fn load_secret(&self) -> Result<Vec<u8>, ConfigError> {
        let secret = match (&self.secret_file, &self.secret) {
            (Some(path), _) => std::fs::read_to_string(path)
                .map_err(|source| ConfigError::SecretFile {
                    path: path.clone(),
                    source,
                })?
                .trim_end_matches(['\r', '\n'])
                .to_string(),
            (None, Some(secret)) => secret.clone(),
            (None, None) => return Err(ConfigError::Missing("auth.secret")),
        };

        if secret.is_empty() {
            return Err(ConfigError::Missing("auth.secret"));
        }
        Ok(secret.into_bytes())
    }
}
