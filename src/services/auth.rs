//! Registration, login and logout.
//!
//! This is the only writer of the token store. A successful call writes the
//! credential and profile before the validator re-derives state; any failure
//! leaves the store empty.

use crate::client::http::ApiClient;
use crate::fallback::dispatcher::FallbackPolicy;
use crate::protocol::models::{AuthResponse, IdentityFacts};
use crate::session::store::TokenStore;
use crate::session::validator::SessionValidator;
use crate::simulation::backend::{is_simulated_token, SimulatedBackend};
use crate::LifelineError;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthAction {
    Register,
    Login,
}

impl AuthAction {
    fn name(self) -> &'static str {
        match self {
            AuthAction::Register => "register",
            AuthAction::Login => "login",
        }
    }
}

/// Authentication flow.
pub struct AuthService {
    client: Arc<ApiClient>,
    simulation: Arc<SimulatedBackend>,
    fallback: FallbackPolicy,
    store: Arc<TokenStore>,
    validator: Arc<SessionValidator>,
}

impl AuthService {
    /// Create the auth flow.
    pub fn new(
        client: Arc<ApiClient>,
        simulation: Arc<SimulatedBackend>,
        fallback: FallbackPolicy,
        store: Arc<TokenStore>,
        validator: Arc<SessionValidator>,
    ) -> Self {
        Self {
            client,
            simulation,
            fallback,
            store,
            validator,
        }
    }

    /// Register a new user and start a session.
    ///
    /// # Errors
    /// - `ValidationFailed` - incomplete identity facts
    /// - `DuplicateEntity` - a matching user already exists
    /// - `InvalidResponse` - the server answered without a token
    /// - `NetworkUnreachable` / `ServerFault` - when no fallback applies
    pub async fn register(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        self.authenticate(AuthAction::Register, facts).await
    }

    /// Log in an existing user and start a session.
    ///
    /// # Errors
    /// - `ValidationFailed` - incomplete identity facts
    /// - `AuthenticationRejected` - no user matches these facts
    /// - `InvalidResponse` - the server answered without a token
    /// - `NetworkUnreachable` / `ServerFault` - when no fallback applies
    pub async fn login(&self, facts: &IdentityFacts) -> Result<AuthResponse, LifelineError> {
        self.authenticate(AuthAction::Login, facts).await
    }

    /// End the session. A simulated token is also revoked.
    pub fn logout(&self) {
        if let Some(token) = self.store.bearer().filter(|t| is_simulated_token(t)) {
            if let Err(e) = self.simulation.revoke(&token) {
                tracing::warn!(error = %e, "failed to revoke simulated token");
            }
        }
        self.validator.invalidate();
        tracing::info!("logged out");
    }

    async fn authenticate(
        &self,
        action: AuthAction,
        facts: &IdentityFacts,
    ) -> Result<AuthResponse, LifelineError> {
        let result = match facts.validate() {
            Err(e) => Err(e),
            Ok(()) => match action {
                AuthAction::Register => {
                    self.fallback
                        .with_fallback(
                            action.name(),
                            || self.client.register(facts),
                            || self.simulation.register(facts),
                        )
                        .await
                }
                AuthAction::Login => {
                    self.fallback
                        .with_fallback(
                            action.name(),
                            || self.client.login(facts),
                            || self.simulation.login(facts),
                        )
                        .await
                }
            },
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(action = action.name(), error = %e, "authentication failed");
                self.validator.invalidate();
                return Err(e);
            }
        };

        let profile = response
            .user
            .clone()
            .unwrap_or_else(|| facts.to_profile(None));

        if let Err(e) = self.store.establish(&response.token, response.expires_in, &profile) {
            self.validator.invalidate();
            return Err(e);
        }

        self.validator.check();
        tracing::info!(
            action = action.name(),
            user_id = profile.id.as_deref().unwrap_or("-"),
            "session established"
        );

        Ok(response)
    }
}
