//! Lifeline error types.

use thiserror::Error;

/// Stock message for a request that never received a response.
pub const NETWORK_MESSAGE: &str =
    "Cannot connect to the server. Please check your internet connection or try again later.";

/// Fixed message for remapped "user does not exist" rejections.
pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "Invalid credentials. Please check your information and try again.";

/// Fixed message for remapped "already exists" rejections.
pub const DUPLICATE_USER_MESSAGE: &str =
    "A user with these details already exists. Please use different information or try logging in instead.";

const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Errors surfaced by the Lifeline client.
///
/// HTTP-shaped variants carry the server-provided message when one was
/// returned; [`LifelineError::user_message`] falls back to stock text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifelineError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No response was received (offline, aborted or timed out).
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The server rejected the credentials (401).
    #[error("Authentication rejected")]
    AuthenticationRejected {
        /// Server-provided message.
        message: Option<String>,
    },

    /// The server refused the action (403).
    #[error("Authorization denied")]
    AuthorizationDenied {
        /// Server-provided message.
        message: Option<String>,
    },

    /// The resource does not exist (404).
    #[error("Not found")]
    NotFound {
        /// Server-provided message.
        message: Option<String>,
    },

    /// The entity already exists (409).
    #[error("Duplicate entity")]
    DuplicateEntity {
        /// Server-provided message.
        message: Option<String>,
    },

    /// Input was rejected, either locally (400) or by the server (400, 422).
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason.
        message: String,
    },

    /// The server failed (5xx).
    #[error("Server fault ({status})")]
    ServerFault {
        /// HTTP status code.
        status: u16,
        /// Server-provided message.
        message: Option<String>,
    },

    /// Any other non-success status.
    #[error("Request failed ({status})")]
    UnknownFailure {
        /// HTTP status code.
        status: u16,
        /// Server-provided message.
        message: Option<String>,
    },

    /// The server answered successfully but the payload is unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Storage backend I/O error.
    #[error("Storage I/O error: {0}")]
    StorageIO(String),
}

impl LifelineError {
    /// Input rejected before any request was sent.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        LifelineError::ValidationFailed {
            status: 400,
            message: message.into(),
        }
    }

    /// Classify an HTTP error status with an optional server message.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            400 | 422 => LifelineError::ValidationFailed {
                status,
                message: message.unwrap_or_else(|| "The request was invalid.".to_string()),
            },
            401 => LifelineError::AuthenticationRejected { message },
            403 => LifelineError::AuthorizationDenied { message },
            404 => LifelineError::NotFound { message },
            409 => LifelineError::DuplicateEntity { message },
            500..=599 => LifelineError::ServerFault { status, message },
            _ => LifelineError::UnknownFailure { status, message },
        }
    }

    /// HTTP-like status code for this error, if it has one.
    ///
    /// `NetworkUnreachable` reports `0`, matching a request that never got
    /// a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            LifelineError::NetworkUnreachable(_) => Some(0),
            LifelineError::AuthenticationRejected { .. } => Some(401),
            LifelineError::AuthorizationDenied { .. } => Some(403),
            LifelineError::NotFound { .. } => Some(404),
            LifelineError::DuplicateEntity { .. } => Some(409),
            LifelineError::ValidationFailed { status, .. } => Some(*status),
            LifelineError::ServerFault { status, .. } => Some(*status),
            LifelineError::UnknownFailure { status, .. } => Some(*status),
            LifelineError::ConfigError(_)
            | LifelineError::InvalidResponse(_)
            | LifelineError::StorageIO(_) => None,
        }
    }

    /// Authoritative rejections are never recovered by the simulation.
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            LifelineError::AuthenticationRejected { .. }
                | LifelineError::AuthorizationDenied { .. }
                | LifelineError::DuplicateEntity { .. }
        )
    }

    /// Infrastructure failures that may be served by the simulation outside
    /// production.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LifelineError::NetworkUnreachable(_) | LifelineError::ServerFault { .. }
        )
    }

    /// Server-provided message, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            LifelineError::AuthenticationRejected { message }
            | LifelineError::AuthorizationDenied { message }
            | LifelineError::NotFound { message }
            | LifelineError::DuplicateEntity { message }
            | LifelineError::ServerFault { message, .. }
            | LifelineError::UnknownFailure { message, .. } => message.as_deref(),
            LifelineError::ValidationFailed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Message suitable for showing to a person.
    ///
    /// Preference order: server message, status-derived stock message,
    /// generic text.
    pub fn user_message(&self) -> String {
        if let Some(message) = self.server_message().filter(|m| !m.trim().is_empty()) {
            return message.to_string();
        }

        let stock = match self {
            LifelineError::NetworkUnreachable(_) => NETWORK_MESSAGE,
            LifelineError::AuthenticationRejected { .. } => {
                "Authentication failed. Please check your credentials and try again."
            }
            LifelineError::AuthorizationDenied { .. } => {
                "You do not have permission to perform this action."
            }
            LifelineError::NotFound { .. } => "The requested resource was not found.",
            LifelineError::DuplicateEntity { .. } => DUPLICATE_USER_MESSAGE,
            LifelineError::ServerFault { .. } => "Server error. Please try again later.",
            _ => GENERIC_MESSAGE,
        };
        stock.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            LifelineError::from_status(401, None),
            LifelineError::AuthenticationRejected { .. }
        ));
        assert!(matches!(
            LifelineError::from_status(403, None),
            LifelineError::AuthorizationDenied { .. }
        ));
        assert!(matches!(
            LifelineError::from_status(404, None),
            LifelineError::NotFound { .. }
        ));
        assert!(matches!(
            LifelineError::from_status(409, None),
            LifelineError::DuplicateEntity { .. }
        ));
        assert!(matches!(
            LifelineError::from_status(400, None),
            LifelineError::ValidationFailed { .. }
        ));
        assert!(matches!(
            LifelineError::from_status(503, None),
            LifelineError::ServerFault { status: 503, .. }
        ));
        assert!(matches!(
            LifelineError::from_status(418, None),
            LifelineError::UnknownFailure { status: 418, .. }
        ));
    }

    #[test]
    fn test_validation_keeps_server_status() {
        assert_eq!(LifelineError::from_status(422, None).status(), Some(422));
        assert_eq!(LifelineError::from_status(400, None).status(), Some(400));
        assert_eq!(LifelineError::invalid_input("bad").status(), Some(400));
        assert_eq!(
            LifelineError::from_status(422, Some("phone taken".into())).user_message(),
            "phone taken"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LifelineError::NetworkUnreachable("x".into()).status(), Some(0));
        assert_eq!(LifelineError::from_status(502, None).status(), Some(502));
        assert_eq!(LifelineError::InvalidResponse("x".into()).status(), None);
    }

    #[test]
    fn test_authoritative_and_transient_are_disjoint() {
        let all = [
            LifelineError::NetworkUnreachable("offline".into()),
            LifelineError::from_status(400, None),
            LifelineError::from_status(401, None),
            LifelineError::from_status(403, None),
            LifelineError::from_status(404, None),
            LifelineError::from_status(409, None),
            LifelineError::from_status(500, None),
            LifelineError::from_status(418, None),
        ];
        for err in &all {
            assert!(!(err.is_authoritative() && err.is_transient()), "{err:?}");
        }
        assert!(LifelineError::from_status(409, None).is_authoritative());
        assert!(LifelineError::from_status(500, None).is_transient());
        assert!(!LifelineError::from_status(404, None).is_transient());
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = LifelineError::from_status(404, Some("Contact not found.".into()));
        assert_eq!(err.user_message(), "Contact not found.");
    }

    #[test]
    fn test_user_message_stock_by_status() {
        assert_eq!(
            LifelineError::from_status(403, None).user_message(),
            "You do not have permission to perform this action."
        );
        assert_eq!(
            LifelineError::from_status(500, Some("  ".into())).user_message(),
            "Server error. Please try again later."
        );
        assert_eq!(
            LifelineError::NetworkUnreachable("timeout".into()).user_message(),
            NETWORK_MESSAGE
        );
    }

    #[test]
    fn test_user_message_generic_fallback() {
        assert_eq!(
            LifelineError::from_status(418, None).user_message(),
            GENERIC_MESSAGE
        );
        assert_eq!(
            LifelineError::StorageIO("disk".into()).user_message(),
            GENERIC_MESSAGE
        );
    }
}
