//! Key-value storage backends.
//!
//! The session uses an ephemeral [`MemoryStore`] that lives as long as the
//! client; the simulated backend uses a durable [`FileStore`].

pub mod file;
pub mod memory;

use crate::LifelineError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// String key-value storage.
///
/// Values are opaque strings (JSON in practice). Implementations must be
/// safe to share between the session validator task and request callers.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, LifelineError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), LifelineError>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), LifelineError>;
}
