//! Fallback dispatcher.
//!
//! Runs a remote operation and, when the failure allows it, re-runs the same
//! operation against the local simulation. The decision is asymmetric:
//! - production builds never fall back
//! - authoritative rejections (401, 403, 409) never fall back
//! - otherwise mock-only mode falls back on any failure, and development
//!   builds fall back on network failures and 5xx
//! - a call carrying a server-issued credential never falls back, since the
//!   simulation would reject a token it never issued

use crate::config::{BuildMode, LifelineConfig};
use crate::simulation::backend::is_simulated_token;
use crate::LifelineError;
use std::future::Future;

/// Decides whether a failed primary call is retried against the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    mode: BuildMode,
    mock_only: bool,
    foreign_credential: bool,
}

impl FallbackPolicy {
    /// Create a policy.
    pub fn new(mode: BuildMode, mock_only: bool) -> Self {
        Self {
            mode,
            mock_only,
            foreign_credential: false,
        }
    }

    /// Policy described by a configuration.
    pub fn from_config(config: &LifelineConfig) -> Self {
        Self::new(config.mode, config.mock_only)
    }

    /// Policy for a call made with `token` as its bearer credential.
    pub fn for_credential(self, token: Option<&str>) -> Self {
        Self {
            foreign_credential: token.is_some_and(|t| !is_simulated_token(t)),
            ..self
        }
    }

    /// Whether `error` from the primary path should be served by the
    /// simulation.
    pub fn should_fallback(&self, error: &LifelineError) -> bool {
        if self.mode.is_production() || self.foreign_credential || error.is_authoritative() {
            return false;
        }
        self.mock_only || error.is_transient()
    }

    /// Run `primary`; on an eligible failure run `secondary` instead.
    ///
    /// The caller sees either the primary result, the secondary result, or
    /// the unchanged primary error.
    pub async fn with_fallback<T, P, PF, S, SF>(
        &self,
        operation: &str,
        primary: P,
        secondary: S,
    ) -> Result<T, LifelineError>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T, LifelineError>>,
        S: FnOnce() -> SF,
        SF: Future<Output = Result<T, LifelineError>>,
    {
        match primary().await {
            Ok(value) => Ok(value),
            Err(error) if self.should_fallback(&error) => {
                tracing::warn!(operation, error = %error, "remote call failed, using simulation");
                secondary().await
            }
            Err(error) => {
                tracing::debug!(operation, error = %error, "remote call failed, no fallback");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server_fault() -> LifelineError {
        LifelineError::ServerFault {
            status: 500,
            message: None,
        }
    }

    fn network() -> LifelineError {
        LifelineError::NetworkUnreachable("offline".into())
    }

    async fn run(
        policy: FallbackPolicy,
        primary: Result<&'static str, LifelineError>,
        calls: &AtomicUsize,
    ) -> Result<&'static str, LifelineError> {
        policy
            .with_fallback(
                "test",
                || async move { primary },
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("simulated")
                },
            )
            .await
    }

    #[tokio::test]
    async fn test_production_never_falls_back() {
        for mock_only in [false, true] {
            let policy = FallbackPolicy::new(BuildMode::Production, mock_only);
            for error in [server_fault(), network()] {
                let calls = AtomicUsize::new(0);
                let result = run(policy, Err(error.clone()), &calls).await;
                assert_eq!(result, Err(error));
                assert_eq!(calls.load(Ordering::SeqCst), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_development_server_fault_uses_secondary() {
        let policy = FallbackPolicy::new(BuildMode::Development, false);
        let calls = AtomicUsize::new(0);
        let result = run(policy, Err(server_fault()), &calls).await;
        assert_eq!(result, Ok("simulated"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_development_network_failure_uses_secondary() {
        let policy = FallbackPolicy::new(BuildMode::Development, false);
        let calls = AtomicUsize::new(0);
        assert_eq!(run(policy, Err(network()), &calls).await, Ok("simulated"));
    }

    #[tokio::test]
    async fn test_authoritative_failures_propagate() {
        for mock_only in [false, true] {
            let policy = FallbackPolicy::new(BuildMode::Development, mock_only);
            for status in [401, 403, 409] {
                let error = LifelineError::from_status(status, None);
                let calls = AtomicUsize::new(0);
                let result = run(policy, Err(error.clone()), &calls).await;
                assert_eq!(result, Err(error));
                assert_eq!(calls.load(Ordering::SeqCst), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_development_other_failures_propagate() {
        let policy = FallbackPolicy::new(BuildMode::Development, false);
        let error = LifelineError::from_status(404, Some("gone".into()));
        let calls = AtomicUsize::new(0);
        assert_eq!(run(policy, Err(error.clone()), &calls).await, Err(error));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mock_only_covers_non_authoritative_failures() {
        let policy = FallbackPolicy::new(BuildMode::Development, true);
        let calls = AtomicUsize::new(0);
        let error = LifelineError::InvalidResponse("missing token".into());
        assert_eq!(run(policy, Err(error), &calls).await, Ok("simulated"));
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let policy = FallbackPolicy::new(BuildMode::Development, true);
        let calls = AtomicUsize::new(0);
        assert_eq!(run(policy, Ok("remote"), &calls).await, Ok("remote"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_credential_keeps_primary_error() {
        for mock_only in [false, true] {
            let policy =
                FallbackPolicy::new(BuildMode::Development, mock_only).for_credential(Some("real-token"));
            let calls = AtomicUsize::new(0);
            let result = run(policy, Err(server_fault()), &calls).await;
            assert_eq!(result, Err(server_fault()));
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_simulated_or_missing_credential_falls_back() {
        let policy = FallbackPolicy::new(BuildMode::Development, false);
        for token in [Some("sim-abc"), None] {
            let calls = AtomicUsize::new(0);
            let result = run(policy.for_credential(token), Err(network()), &calls).await;
            assert_eq!(result, Ok("simulated"));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_secondary_error_is_returned() {
        let policy = FallbackPolicy::new(BuildMode::Development, false);
        let result: Result<(), LifelineError> = policy
            .with_fallback(
                "test",
                || async { Err(server_fault()) },
                || async { Err(LifelineError::from_status(409, None)) },
            )
            .await;
        assert_eq!(result.unwrap_err().status(), Some(409));
    }
}
