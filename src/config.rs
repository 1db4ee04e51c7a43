//! Lifeline configuration.

use crate::LifelineError;
use std::time::Duration;

/// Default API base URL for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Default credential lifetime when neither the server nor the environment
/// supplies one.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Per-request ceiling; exceeding it counts as "network unreachable".
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Session revalidation period.
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Build mode. Production disables every simulation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Local development; transient failures may be simulated.
    #[default]
    Development,
    /// Deployed build.
    Production,
}

impl BuildMode {
    /// Whether this is a deployed build.
    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

/// Configuration for the Lifeline client.
#[derive(Debug, Clone)]
pub struct LifelineConfig {
    /// API base URL, without trailing slash (e.g. "https://api.example.com/api").
    pub base_url: String,

    /// Credential lifetime used when the server omits `expiresIn`.
    pub token_ttl: Duration,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// How often the session validator re-checks the token store.
    pub revalidate_interval: Duration,

    /// Build mode.
    pub mode: BuildMode,

    /// Route every failed call to the simulation (never in production).
    pub mock_only: bool,

    /// Directory name under `dirs::data_dir()` for the simulation store.
    pub simulation_namespace: String,

    /// Artificial delay applied to every simulated call.
    pub simulated_latency: Duration,
}

impl Default for LifelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            mode: BuildMode::Development,
            mock_only: false,
            simulation_namespace: "lifeline-sim".to_string(),
            simulated_latency: Duration::from_millis(500),
        }
    }
}

impl LifelineConfig {
    /// Build configuration from process environment variables.
    ///
    /// Reads `LIFELINE_API_URL`, `LIFELINE_TOKEN_TTL` (seconds),
    /// `LIFELINE_ENV` (`production` or `development`) and
    /// `LIFELINE_MOCK_API` (`true`/`false`).
    pub fn from_env() -> Result<Self, LifelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LifelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LIFELINE_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(ttl) = lookup("LIFELINE_TOKEN_TTL") {
            let secs: u64 = ttl.trim().parse().map_err(|_| {
                LifelineError::ConfigError(format!("LIFELINE_TOKEN_TTL must be whole seconds, got {:?}", ttl))
            })?;
            config.token_ttl = Duration::from_secs(secs);
        }

        if let Some(env) = lookup("LIFELINE_ENV") {
            config.mode = match env.trim().to_ascii_lowercase().as_str() {
                "production" | "prod" => BuildMode::Production,
                "development" | "dev" | "test" => BuildMode::Development,
                other => {
                    return Err(LifelineError::ConfigError(format!(
                        "LIFELINE_ENV must be production or development, got {:?}",
                        other
                    )))
                }
            };
        }

        if let Some(flag) = lookup("LIFELINE_MOCK_API") {
            config.mock_only = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LifelineError> {
        if self.base_url.is_empty() {
            return Err(LifelineError::ConfigError(
                "base_url cannot be empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(LifelineError::ConfigError(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.mode.is_production() && !self.base_url.starts_with("https://") {
            return Err(LifelineError::ConfigError(
                "base_url must use https in production".to_string(),
            ));
        }
        if self.token_ttl.is_zero() {
            return Err(LifelineError::ConfigError(
                "token_ttl must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.revalidate_interval.is_zero() {
            return Err(LifelineError::ConfigError(
                "request_timeout and revalidate_interval must be positive".to_string(),
            ));
        }
        if self.simulation_namespace.is_empty() {
            return Err(LifelineError::ConfigError(
                "simulation_namespace cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether simulated fallbacks can ever run with this configuration.
    pub fn simulation_enabled(&self) -> bool {
        !self.mode.is_production()
    }
}
