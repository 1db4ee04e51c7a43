//! Session validation and periodic revalidation.
//!
//! The validator derives an [`AuthState`] from the token store on demand
//! ([`SessionValidator::check`], [`SessionValidator::guard`]) and on a fixed
//! timer ([`SessionValidator::start`]). State changes are published on a
//! `tokio::sync::watch` channel.

use crate::policy::navigation::Route;
use crate::protocol::models::UserProfile;
use crate::session::store::TokenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Authentication state exposed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No check has completed yet.
    Loading,
    /// No live session.
    Unauthenticated,
    /// Live session for this profile.
    Authenticated(UserProfile),
}

impl AuthState {
    /// Whether a live session exists.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Outcome of checking a gated view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Render the view for this user.
    Allow(UserProfile),
    /// Navigate elsewhere instead.
    Redirect(Route),
}

/// Derives authentication state from the token store.
pub struct SessionValidator {
    store: Arc<TokenStore>,
    state: watch::Sender<AuthState>,
    interval: Duration,
}

impl SessionValidator {
    /// Create a validator in the `Loading` state.
    pub fn new(store: Arc<TokenStore>, interval: Duration) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            store,
            state,
            interval,
        }
    }

    /// Current state without re-checking storage.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Re-read the token store and publish the resulting state.
    ///
    /// Safe to call against empty storage.
    pub fn check(&self) -> AuthState {
        let next = match self.store.session() {
            Some(session) => AuthState::Authenticated(session.profile),
            None => AuthState::Unauthenticated,
        };
        self.publish(next.clone());
        next
    }

    /// Drop the session after an out-of-band rejection (e.g. a 401).
    pub fn invalidate(&self) {
        self.store.clear();
        self.publish(AuthState::Unauthenticated);
    }

    /// Re-validate before rendering a gated view.
    pub fn guard(&self) -> Gate {
        match self.check() {
            AuthState::Authenticated(profile) => Gate::Allow(profile),
            _ => Gate::Redirect(Route::Login),
        }
    }

    /// Spawn the periodic revalidation task on the current Tokio runtime.
    ///
    /// The first check runs immediately. The task stops when the returned
    /// handle is stopped or dropped.
    pub fn start(self: &Arc<Self>) -> RevalidationTask {
        let validator = Arc::clone(self);
        let period = self.interval;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let state = validator.check();
                        tracing::trace!(authenticated = state.is_authenticated(), "session revalidated");
                    }
                }
            }
        });

        tracing::debug!(interval_secs = period.as_secs(), "session revalidation started");

        RevalidationTask {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    fn publish(&self, next: AuthState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!("auth state changed");
        }
    }
}

/// Handle to the periodic revalidation task.
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct RevalidationTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RevalidationTask {
    /// Stop the task and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        tracing::debug!("session revalidation stopped");
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RevalidationTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
