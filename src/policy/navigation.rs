//! Top-level error policy.
//!
//! The HTTP client never navigates. Callers hand every error to
//! [`ErrorPolicy::resolve`], which picks the message to show, decides
//! whether to send the user back to login, and logs outside production.

use crate::config::BuildMode;
use crate::LifelineError;

/// Views the application can be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing page.
    Home,
    /// Login form.
    Login,
    /// Registration form.
    Register,
    /// Emergency contact list (gated).
    Contacts,
}

impl Route {
    /// Login and registration are auth views; they never redirect to login.
    pub fn is_auth_view(self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    /// Path of this view.
    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Contacts => "/contacts",
        }
    }
}

/// Which kind of call produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// A login or register attempt.
    Auth,
    /// Any call made with an existing session.
    Resource,
}

/// What the caller should do with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Message to show the user.
    pub message: String,
    /// View to navigate to, if any.
    pub redirect: Option<Route>,
    /// Whether the session was lost.
    pub session_ended: bool,
}

/// Maps errors to user-facing outcomes.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPolicy {
    mode: BuildMode,
}

impl ErrorPolicy {
    /// Create a policy for the given build mode.
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    /// Resolve an error raised while `current` was displayed.
    ///
    /// A 401 from a resource call redirects to login unless the user is
    /// already on an auth view.
    pub fn resolve(&self, error: &LifelineError, current: Route, origin: RequestOrigin) -> Resolution {
        self.report(error, current.path());

        let session_ended = matches!(error, LifelineError::AuthenticationRejected { .. });
        let redirect = (session_ended && origin == RequestOrigin::Resource && !current.is_auth_view())
            .then_some(Route::Login);

        if redirect.is_some() {
            tracing::info!(from = current.path(), "session rejected, redirecting to login");
        }

        Resolution {
            message: error.user_message(),
            redirect,
            session_ended,
        }
    }

    /// Log an error with context. Silent in production builds.
    pub fn report(&self, error: &LifelineError, context: &str) {
        if self.mode.is_production() {
            return;
        }

        match error.status() {
            Some(status) => tracing::error!(
                context,
                status,
                server_message = error.server_message().unwrap_or(""),
                error = %error,
                "request failed"
            ),
            None => tracing::error!(context, error = %error, "operation failed"),
        }
    }
}
