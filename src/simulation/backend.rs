//! Simulated backend over a durable key-value store.
//!
//! Mirrors the remote API closely enough for offline development: users,
//! per-user contacts and issued tokens are persisted under three keys.
//! Every call waits `latency` first to mimic the network.

use crate::clock::Clock;
use crate::protocol::models::{
    AuthResponse, Contact, IdentityFacts, NewContact, UserProfile, MAX_CONTACTS,
};
use crate::storage::KeyValueStore;
use crate::LifelineError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const USERS_KEY: &str = "sim_users";
const CONTACTS_KEY: &str = "sim_contacts";
const SESSIONS_KEY: &str = "sim_sessions";

/// Prefix carried by every token the simulation issues.
pub const SIMULATED_TOKEN_PREFIX: &str = "sim-";

/// Whether `token` was issued by a [`SimulatedBackend`].
pub fn is_simulated_token(token: &str) -> bool {
    token.starts_with(SIMULATED_TOKEN_PREFIX)
}

/// A user known to the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimUser {
    /// Generated user id.
    pub id: String,
    /// Name as registered.
    pub full_name: String,
    /// Date of birth as `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// Phone number, unique across users.
    pub phone_number: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl SimUser {
    fn profile(&self) -> UserProfile {
        UserProfile {
            id: Some(self.id.clone()),
            full_name: self.full_name.clone(),
            phone_number: self.phone_number.clone(),
        }
    }

    fn matches(&self, facts: &IdentityFacts) -> bool {
        self.full_name.eq_ignore_ascii_case(&facts.full_name)
            && self.date_of_birth == facts.date_of_birth
            && self.phone_number == facts.phone_number
    }

    fn conflicts_with(&self, facts: &IdentityFacts) -> bool {
        self.phone_number == facts.phone_number
            || (self.full_name.eq_ignore_ascii_case(&facts.full_name)
                && self.date_of_birth == facts.date_of_birth)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimSession {
    user_id: String,
    expires: i64,
}

/// Point-in-time copy of the simulated state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSnapshot {
    /// Registered users.
    pub users: Vec<SimUser>,
    /// Contacts keyed by user id.
    pub contacts: HashMap<String, Vec<Contact>>,
}

/// In-process stand-in for the remote API.
pub struct SimulatedBackend {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    latency: Duration,
    token_ttl: Duration,
    write_lock: Mutex<()>,
}

impl SimulatedBackend {
    /// Create a simulated backend over `store`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        latency: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            latency,
            token_ttl,
            write_lock: Mutex::new(()),
        }
    }

    /// Register a new user and issue a token.
    pub async fn register(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        self.delay().await;
        let _guard = self.lock()?;

        let mut users: Vec<SimUser> = self.load(USERS_KEY)?;
        if users.iter().any(|u| u.conflicts_with(facts)) {
            tracing::debug!("simulated register rejected: user exists");
            return Err(LifelineError::DuplicateEntity {
                message: Some(
                    "A user with this name and date of birth or phone number already exists."
                        .to_string(),
                ),
            });
        }

        let user = SimUser {
            id: Uuid::new_v4().to_string(),
            full_name: facts.full_name.clone(),
            date_of_birth: facts.date_of_birth.clone(),
            phone_number: facts.phone_number.clone(),
            created_at: self.clock.now_utc(),
        };
        users.push(user.clone());

        let mut contacts: HashMap<String, Vec<Contact>> = self.load(CONTACTS_KEY)?;
        contacts.insert(user.id.clone(), Vec::new());

        self.save(USERS_KEY, &users)?;
        self.save(CONTACTS_KEY, &contacts)?;

        tracing::info!(user_id = %user.id, "simulated registration");
        self.issue_token(&user)
    }

    /// Authenticate an existing user and issue a token.
    pub async fn login(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        self.delay().await;
        let _guard = self.lock()?;

        let users: Vec<SimUser> = self.load(USERS_KEY)?;
        let user = users.iter().find(|u| u.matches(facts)).ok_or_else(|| {
            tracing::debug!("simulated login rejected: no matching user");
            LifelineError::AuthenticationRejected {
                message: Some(
                    "Invalid credentials. Please check your information and try again."
                        .to_string(),
                ),
            }
        })?;

        tracing::info!(user_id = %user.id, "simulated login");
        self.issue_token(user)
    }

    /// Contacts of the token's owner.
    pub async fn list_contacts(&self, token: Option<&str>) -> Result<Vec<Contact>, LifelineError> {
        self.delay().await;
        let _guard = self.lock()?;

        let user_id = self.authorize(token)?;
        let contacts: HashMap<String, Vec<Contact>> = self.load(CONTACTS_KEY)?;
        let list = contacts.get(&user_id).cloned().unwrap_or_default();

        tracing::debug!(user_id = %user_id, count = list.len(), "simulated contact list");
        Ok(list)
    }

    /// Add a contact for the token's owner, enforcing the contact cap.
    pub async fn add_contact(
        &self,
        token: Option<&str>,
        contact: &NewContact,
    ) -> Result<Contact, LifelineError> {
        self.delay().await;
        let _guard = self.lock()?;

        let user_id = self.authorize(token)?;
        let mut contacts: HashMap<String, Vec<Contact>> = self.load(CONTACTS_KEY)?;
        let list = contacts.entry(user_id.clone()).or_default();

        if list.len() >= MAX_CONTACTS {
            return Err(LifelineError::invalid_input(format!(
                "You can only store up to {} emergency contacts.",
                MAX_CONTACTS
            )));
        }

        let created = Contact {
            id: Uuid::new_v4().to_string(),
            name: contact.name.clone(),
            phone_number: contact.phone_number.clone(),
            created_at: Some(self.clock.now_utc()),
        };
        list.push(created.clone());
        self.save(CONTACTS_KEY, &contacts)?;

        tracing::debug!(user_id = %user_id, contact_id = %created.id, "simulated contact added");
        Ok(created)
    }

    /// Delete one of the token owner's contacts.
    pub async fn delete_contact(&self, token: Option<&str>, id: &str) -> Result<(), LifelineError> {
        self.delay().await;
        let _guard = self.lock()?;

        let user_id = self.authorize(token)?;
        let mut contacts: HashMap<String, Vec<Contact>> = self.load(CONTACTS_KEY)?;
        let list = contacts.entry(user_id.clone()).or_default();

        let index = list.iter().position(|c| c.id == id).ok_or_else(|| LifelineError::NotFound {
            message: Some("Contact not found.".to_string()),
        })?;
        list.remove(index);
        self.save(CONTACTS_KEY, &contacts)?;

        tracing::debug!(user_id = %user_id, contact_id = %id, "simulated contact deleted");
        Ok(())
    }

    /// Remove every simulated user, contact and token.
    pub fn clear(&self) -> Result<(), LifelineError> {
        let _guard = self.lock()?;
        for key in [USERS_KEY, CONTACTS_KEY, SESSIONS_KEY] {
            self.store.remove(key)?;
        }
        tracing::info!("simulated state cleared");
        Ok(())
    }

    /// Clear all state and seed a single well-known test user.
    pub fn reset(&self) -> Result<SimUser, LifelineError> {
        self.clear()?;
        let _guard = self.lock()?;

        let user = SimUser {
            id: Uuid::new_v4().to_string(),
            full_name: "Test User".to_string(),
            date_of_birth: "2000-01-01".to_string(),
            phone_number: "+11234567890".to_string(),
            created_at: self.clock.now_utc(),
        };
        let contacts: HashMap<String, Vec<Contact>> =
            HashMap::from([(user.id.clone(), Vec::new())]);

        self.save(USERS_KEY, &vec![user.clone()])?;
        self.save(CONTACTS_KEY, &contacts)?;

        tracing::info!(user_id = %user.id, "simulated state reset with test user");
        Ok(user)
    }

    /// Forget an issued token. Unknown tokens are ignored.
    pub fn revoke(&self, token: &str) -> Result<(), LifelineError> {
        let _guard = self.lock()?;
        let mut sessions: HashMap<String, SimSession> = self.load(SESSIONS_KEY)?;
        if sessions.remove(token).is_some() {
            self.save(SESSIONS_KEY, &sessions)?;
            tracing::debug!("simulated token revoked");
        }
        Ok(())
    }

    /// Copy of the current simulated state.
    pub fn snapshot(&self) -> Result<SimulationSnapshot, LifelineError> {
        let _guard = self.lock()?;
        Ok(SimulationSnapshot {
            users: self.load(USERS_KEY)?,
            contacts: self.load(CONTACTS_KEY)?,
        })
    }

    fn issue_token(&self, user: &SimUser) -> Result<AuthResponse, LifelineError> {
        let token = format!("{}{}", SIMULATED_TOKEN_PREFIX, Uuid::new_v4().simple());
        let now = self.clock.now_utc();
        let expires = TimeDelta::from_std(self.token_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .timestamp_millis();

        let mut sessions: HashMap<String, SimSession> = self.load(SESSIONS_KEY)?;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires > now.timestamp_millis());
        if sessions.len() < before {
            tracing::debug!(pruned = before - sessions.len(), "expired simulated tokens pruned");
        }
        sessions.insert(
            token.clone(),
            SimSession {
                user_id: user.id.clone(),
                expires,
            },
        );
        self.save(SESSIONS_KEY, &sessions)?;

        Ok(AuthResponse {
            token,
            expires_in: Some(self.token_ttl.as_secs()),
            user: Some(user.profile()),
        })
    }

    fn authorize(&self, token: Option<&str>) -> Result<String, LifelineError> {
        let rejected = || LifelineError::AuthenticationRejected {
            message: Some("Your session has expired. Please log in again.".to_string()),
        };

        let token = token.ok_or_else(rejected)?;
        let sessions: HashMap<String, SimSession> = self.load(SESSIONS_KEY)?;
        let session = sessions.get(token).ok_or_else(rejected)?;

        if self.clock.now_utc().timestamp_millis() >= session.expires {
            return Err(rejected());
        }
        Ok(session.user_id.clone())
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, LifelineError> {
        match self.store.get(key)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                LifelineError::StorageIO(format!("Corrupt simulation data under {}: {}", key, e))
            }),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), LifelineError> {
        let json = serde_json::to_string(value)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to serialize {}: {}", key, e)))?;
        self.store.set(key, &json)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, LifelineError> {
        self.write_lock
            .lock()
            .map_err(|_| LifelineError::StorageIO("simulation lock poisoned".to_string()))
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl std::fmt::Debug for SimulatedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBackend")
            .field("latency", &self.latency)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
