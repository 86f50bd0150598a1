use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::SecretBackend;
use super::token::AuthToken;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const EXPIRES_AT_KEY: &str = "expires_at";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed session file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// The persisted projection of an [`AuthToken`]: three independent entries,
/// any of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
}

impl StoredToken {
    pub fn from_token(token: &AuthToken) -> Self {
        Self {
            access_token: Some(token.access_token.clone()),
            refresh_token: Some(token.refresh_token.clone()),
            expires_at: token.expires_at.map(|expiry| expiry.to_rfc3339()),
        }
    }

    /// Rebuild the token, or `None` unless both tokens are present and any
    /// stored expiry parses as RFC 3339.
    pub fn into_token(self) -> Option<AuthToken> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty())?;
        let expires_at = match self.expires_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .ok()?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Some(AuthToken {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

/// Durable storage for the current token pair.
///
/// Writes and clears hold the lock exclusively; reads share it.
pub struct TokenStore<B> {
    backend: B,
    lock: RwLock<()>,
}

impl<B: SecretBackend> TokenStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            lock: RwLock::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the stored token. Missing, partial, or unreadable data is `None`.
    pub fn read(&self) -> Option<AuthToken> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        match self.load() {
            Ok(stored) => stored.into_token(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, treating as logged out");
                None
            }
        }
    }

    /// Persist all three fields. On a partial failure every field is removed
    /// again before the error is returned.
    pub fn write(&self, token: &AuthToken) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let stored = StoredToken::from_token(token);

        if let Err(e) = self.save(&stored) {
            if let Err(rollback) = self.remove_all() {
                warn!(error = %rollback, "Failed to roll back partial token write");
            }
            return Err(e);
        }
        debug!(has_expiry = token.expires_at.is_some(), "Token stored");
        Ok(())
    }

    /// Remove every field. Clearing an empty store succeeds.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        self.remove_all()?;
        debug!("Stored token cleared");
        Ok(())
    }

    fn load(&self) -> Result<StoredToken, StoreError> {
        Ok(StoredToken {
            access_token: self.backend.get(ACCESS_TOKEN_KEY)?,
            refresh_token: self.backend.get(REFRESH_TOKEN_KEY)?,
            expires_at: self.backend.get(EXPIRES_AT_KEY)?,
        })
    }

    fn save(&self, stored: &StoredToken) -> Result<(), StoreError> {
        let fields = [
            (ACCESS_TOKEN_KEY, &stored.access_token),
            (REFRESH_TOKEN_KEY, &stored.refresh_token),
            (EXPIRES_AT_KEY, &stored.expires_at),
        ];
        for (key, value) in fields {
            match value {
                Some(value) => self.backend.set(key, value)?,
                None => self.backend.remove(key)?,
            }
        }
        Ok(())
    }

    /// Attempts every key even if an earlier removal fails.
    fn remove_all(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(e) = self.backend.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
