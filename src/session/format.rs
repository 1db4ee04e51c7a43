//! Stored credential record format.
//!
//! The `token` storage key holds `{"value": "...", "expires": <epoch ms>}`.
//! Anything that does not parse into that shape is treated as absent.

use crate::clock::Clock;
use crate::LifelineError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credential as written to session storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    /// Opaque bearer token.
    pub value: String,

    /// Absolute expiry in milliseconds since the Unix epoch.
    pub expires: i64,
}

impl StoredToken {
    /// Create a record expiring `ttl` from the clock's current time.
    ///
    /// Lifetimes too large to represent saturate at the maximum timestamp.
    pub fn new(value: String, ttl: Duration, clock: &dyn Clock) -> Self {
        let now = clock.now_utc();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            expires: expires_at.timestamp_millis(),
        }
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String, LifelineError> {
        serde_json::to_string(self)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to serialize token: {}", e)))
    }

    /// Deserialize a record from JSON.
    pub fn from_json(json: &str) -> Result<Self, LifelineError> {
        serde_json::from_str(json)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to deserialize token: {}", e)))
    }

    /// Expiry as a timestamp, if representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires)
    }

    /// A record is live while `now < expires` and the value is non-empty.
    pub fn is_live(&self, clock: &dyn Clock) -> bool {
        !self.value.is_empty() && clock.now_utc().timestamp_millis() < self.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::TimeZone;

    fn clock() -> MockClock {
        MockClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_expiry_is_now_plus_ttl_in_millis() {
        let clock = clock();
        let token = StoredToken::new("abc".into(), Duration::from_secs(3600), &clock);
        assert_eq!(
            token.expires,
            clock.now_utc().timestamp_millis() + 3_600_000
        );
        assert_eq!(
            token.expires_at().unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_json_schema() {
        let clock = clock();
        let token = StoredToken::new("abc".into(), Duration::from_secs(1), &clock);
        let json: serde_json::Value = serde_json::from_str(&token.to_json().unwrap()).unwrap();
        assert_eq!(json["value"], "abc");
        assert!(json["expires"].is_i64());
    }

    #[test]
    fn test_liveness_boundary() {
        let clock = clock();
        let token = StoredToken::new("abc".into(), Duration::from_secs(60), &clock);
        assert!(token.is_live(&clock));

        clock.advance(chrono::Duration::milliseconds(59_999));
        assert!(token.is_live(&clock));

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(!token.is_live(&clock));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let clock = clock();
        let token = StoredToken::new("abc".into(), Duration::from_secs(u64::MAX), &clock);
        assert!(token.is_live(&clock));
        assert!(token.expires_at().is_some());
    }

    #[test]
    fn test_empty_value_is_not_live() {
        let clock = clock();
        let token = StoredToken::new(String::new(), Duration::from_secs(60), &clock);
        assert!(!token.is_live(&clock));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(StoredToken::from_json("not json").is_err());
        assert!(StoredToken::from_json(r#"{"value": 5}"#).is_err());
    }
}
