//! Lifeline facade - the main public API.
//!
//! `Lifeline` wires one session context through every component:
//! - token store over session-scoped storage
//! - session validator with periodic revalidation
//! - API client, fallback policy and simulated backend
//! - top-level error policy

use crate::client::http::ApiClient;
use crate::clock::{Clock, SystemClock};
use crate::config::LifelineConfig;
use crate::fallback::dispatcher::FallbackPolicy;
use crate::policy::navigation::{ErrorPolicy, RequestOrigin, Resolution, Route};
use crate::services::auth::AuthService;
use crate::services::contacts::ContactService;
use crate::session::store::{Session, TokenStore};
use crate::session::validator::{AuthState, Gate, RevalidationTask, SessionValidator};
use crate::simulation::backend::{SimUser, SimulatedBackend};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::LifelineError;
use std::sync::Arc;

/// Main client handle.
///
/// Create one per browsing session and reuse it for every call.
pub struct Lifeline {
    config: LifelineConfig,
    store: Arc<TokenStore>,
    validator: Arc<SessionValidator>,
    simulation: Arc<SimulatedBackend>,
    auth: AuthService,
    contacts: ContactService,
    policy: ErrorPolicy,
}

impl Lifeline {
    /// Create a client with in-memory session storage, the system clock and
    /// a file-backed simulation store under `dirs::data_dir()`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    /// - The simulation directory cannot be created
    pub fn new(config: LifelineConfig) -> Result<Self, LifelineError> {
        Self::builder(config).build()
    }

    /// Start a builder for injecting storage and clock.
    pub fn builder(config: LifelineConfig) -> LifelineBuilder {
        LifelineBuilder {
            config,
            session_storage: None,
            simulation_storage: None,
            clock: None,
        }
    }

    /// Registration, login and logout.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Contact list operations.
    pub fn contacts(&self) -> &ContactService {
        &self.contacts
    }

    /// Session validator.
    pub fn validator(&self) -> &Arc<SessionValidator> {
        &self.validator
    }

    /// Current credential and profile, if the session is live.
    pub fn session(&self) -> Option<Session> {
        self.store.session()
    }

    /// Last published authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.validator.state()
    }

    /// Re-validate before rendering a gated view.
    pub fn guard(&self) -> Gate {
        self.validator.guard()
    }

    /// Start periodic revalidation. Must be called within a Tokio runtime.
    pub fn start_revalidation(&self) -> RevalidationTask {
        self.validator.start()
    }

    /// Resolve an error for display and navigation.
    ///
    /// A rejected session is also dropped from the validator so gated views
    /// close immediately.
    pub fn resolve_error(
        &self,
        error: &LifelineError,
        current: Route,
        origin: RequestOrigin,
    ) -> Resolution {
        let resolution = self.policy.resolve(error, current, origin);
        if resolution.session_ended {
            self.validator.invalidate();
            self.contacts.forget();
        }
        resolution
    }

    /// Wipe the simulation, seed the test user and end the session.
    ///
    /// # Errors
    /// - `ConfigError` - called in a production build
    pub fn reset_simulation(&self) -> Result<SimUser, LifelineError> {
        if !self.config.simulation_enabled() {
            return Err(LifelineError::ConfigError(
                "simulation is disabled in production".to_string(),
            ));
        }
        let user = self.simulation.reset()?;
        self.auth.logout();
        self.contacts.forget();
        Ok(user)
    }

    /// Direct access to the simulated backend.
    pub fn simulation(&self) -> &Arc<SimulatedBackend> {
        &self.simulation
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LifelineConfig {
        &self.config
    }
}

/// Builder for [`Lifeline`].
pub struct LifelineBuilder {
    config: LifelineConfig,
    session_storage: Option<Arc<dyn KeyValueStore>>,
    simulation_storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl LifelineBuilder {
    /// Storage for the credential and profile. Defaults to a fresh
    /// [`MemoryStore`].
    pub fn session_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Durable storage for the simulated backend. Defaults to a
    /// [`FileStore`] named by `simulation_namespace`.
    pub fn simulation_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.simulation_storage = Some(storage);
        self
    }

    /// Clock for expiry checks. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate configuration and assemble the client.
    pub fn build(self) -> Result<Lifeline, LifelineError> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let session_storage = self
            .session_storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let simulation_storage = match self.simulation_storage {
            Some(storage) => storage,
            None => Arc::new(FileStore::new(&config.simulation_namespace)?),
        };

        let store = Arc::new(TokenStore::new(
            session_storage,
            clock.clone(),
            config.token_ttl,
        ));
        let validator = Arc::new(SessionValidator::new(
            store.clone(),
            config.revalidate_interval,
        ));
        let client = Arc::new(ApiClient::new(&config, store.clone())?);
        let simulation = Arc::new(SimulatedBackend::new(
            simulation_storage,
            clock,
            config.simulated_latency,
            config.token_ttl,
        ));
        let fallback = FallbackPolicy::from_config(&config);

        let auth = AuthService::new(
            client.clone(),
            simulation.clone(),
            fallback,
            store.clone(),
            validator.clone(),
        );
        let contacts = ContactService::new(
            client,
            simulation.clone(),
            fallback,
            store.clone(),
            validator.clone(),
        );

        tracing::info!(
            base_url = %config.base_url,
            production = config.mode.is_production(),
            mock_only = config.mock_only,
            timeout_secs = config.request_timeout.as_secs(),
            "lifeline client configured"
        );

        Ok(Lifeline {
            policy: ErrorPolicy::new(config.mode),
            config,
            store,
            validator,
            simulation,
            auth,
            contacts,
        })
    }
}
