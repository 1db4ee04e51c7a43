//! Token store: the session context shared by every component.
//!
//! Holds the credential under [`TOKEN_KEY`] and the cached profile under
//! [`USER_KEY`]. Both are written together by the auth flow only
//! (crate-private setters) and cleared together by anyone. Reads never fail:
//! expired or malformed data clears both keys and reads as absent.

use crate::clock::Clock;
use crate::protocol::models::UserProfile;
use crate::session::format::StoredToken;
use crate::storage::KeyValueStore;
use crate::LifelineError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Storage key for the credential record.
pub const TOKEN_KEY: &str = "token";

/// Storage key for the cached user profile.
pub const USER_KEY: &str = "user";

/// Live bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque token value.
    pub value: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// Credential and profile, read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Live credential.
    pub credential: Credential,
    /// Profile of the signed-in user.
    pub profile: UserProfile,
}

/// Session-scoped credential and profile store.
///
/// Every public operation holds one lock for its whole duration, so a
/// reader never observes the credential without its profile.
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    guard: Mutex<()>,
}

impl TokenStore {
    /// Create a token store over the given session storage.
    ///
    /// `default_ttl` applies when the server does not send `expiresIn`.
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            storage,
            clock,
            default_ttl,
            guard: Mutex::new(()),
        }
    }

    /// Write a credential expiring `ttl_seconds` from now, replacing any
    /// previous one.
    #[cfg(test)]
    pub(crate) fn save(&self, value: &str, ttl_seconds: u64) -> Result<Credential, LifelineError> {
        let _guard = self.lock();
        self.write_token(value, ttl_seconds)
    }

    /// Write credential and profile as one unit.
    ///
    /// If either write fails both keys are cleared before the error is
    /// returned.
    pub(crate) fn establish(
        &self,
        value: &str,
        ttl_seconds: Option<u64>,
        profile: &UserProfile,
    ) -> Result<Session, LifelineError> {
        let ttl_seconds = ttl_seconds.unwrap_or_else(|| self.default_ttl.as_secs());
        let _guard = self.lock();

        let written = self.write_token(value, ttl_seconds).and_then(|credential| {
            let json = serde_json::to_string(profile)
                .map_err(|e| LifelineError::StorageIO(format!("Failed to serialize profile: {}", e)))?;
            self.storage.set(USER_KEY, &json)?;
            Ok(credential)
        });

        match written {
            Ok(credential) => Ok(Session {
                credential,
                profile: profile.clone(),
            }),
            Err(e) => {
                self.remove_all();
                Err(e)
            }
        }
    }

    /// The credential if present and unexpired.
    ///
    /// Expired, malformed or unreadable data clears both keys and yields
    /// `None`.
    pub fn read(&self) -> Option<Credential> {
        let _guard = self.lock();
        self.read_credential()
    }

    /// The cached profile. A malformed profile clears both keys.
    pub fn profile(&self) -> Option<UserProfile> {
        let _guard = self.lock();
        self.read_profile()
    }

    /// Credential and profile together, or `None`.
    ///
    /// One without the other is an inconsistent session and is cleared.
    pub fn session(&self) -> Option<Session> {
        let _guard = self.lock();
        let credential = self.read_credential();
        let profile = self.read_profile();

        match (credential, profile) {
            (Some(credential), Some(profile)) => Some(Session { credential, profile }),
            (None, None) => None,
            _ => {
                tracing::warn!("credential and profile out of step, clearing session");
                self.remove_all();
                None
            }
        }
    }

    /// Bearer token value for outbound requests.
    pub fn bearer(&self) -> Option<String> {
        self.read().map(|credential| credential.value)
    }

    /// Remove credential and profile unconditionally.
    pub fn clear(&self) {
        let _guard = self.lock();
        self.remove_all();
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable.
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_token(&self, value: &str, ttl_seconds: u64) -> Result<Credential, LifelineError> {
        let record = StoredToken::new(
            value.to_string(),
            Duration::from_secs(ttl_seconds),
            self.clock.as_ref(),
        );
        self.storage.set(TOKEN_KEY, &record.to_json()?)?;

        tracing::debug!(ttl_seconds, "token saved");

        Ok(Credential {
            value: record.value.clone(),
            expires_at: record.expires_at().unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }

    fn read_credential(&self) -> Option<Credential> {
        let raw = match self.storage.get(TOKEN_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "token storage unreadable, clearing session");
                self.remove_all();
                return None;
            }
        };

        let record = match StoredToken::from_json(&raw) {
            Ok(record) => record,
            Err(_) => {
                tracing::warn!("malformed token record, clearing session");
                self.remove_all();
                return None;
            }
        };

        let expires_at = match record.expires_at() {
            Some(at) if record.is_live(self.clock.as_ref()) => at,
            _ => {
                tracing::debug!("token expired, clearing session");
                self.remove_all();
                return None;
            }
        };

        Some(Credential {
            value: record.value,
            expires_at,
        })
    }

    fn read_profile(&self) -> Option<UserProfile> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "profile storage unreadable, clearing session");
                self.remove_all();
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(_) => {
                tracing::warn!("malformed profile record, clearing session");
                self.remove_all();
                None
            }
        }
    }

    fn remove_all(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "failed to clear session key");
            }
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
