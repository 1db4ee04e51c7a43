//! Deterministic clock abstraction for token expiry.

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing.
///
/// Shared through an `Arc` by the token store and the test body, so
/// advancing takes `&self`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("mock clock lock");
        *now += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("mock clock lock")
    }
}
