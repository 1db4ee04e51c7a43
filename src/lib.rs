//! # Lifeline
//!
//! **Session and emergency-contact client for the Lifeline API.**
//!
//! Lifeline keeps a bearer-token session for a user identified by full name,
//! date of birth and phone number, and manages up to five emergency contacts
//! on their behalf.
//!
//! ## Features
//!
//! - **Expiring token store**: credentials are never returned past expiry
//! - **Session validator**: on-demand and periodic checks published over a watch channel
//! - **Bearer injection**: every request carries the live token, and a 401 ends the session
//! - **Error taxonomy**: HTTP statuses and transport failures map to [`LifelineError`]
//! - **Simulated backend**: development builds fall back to a local, persisted simulation
//!
//! ## Quickstart
//!
//! ```no_run
//! use lifeline::{IdentityFacts, Lifeline, LifelineConfig, NewContact};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lifeline::LifelineError> {
//!     let lifeline = Lifeline::new(LifelineConfig::from_env()?)?;
//!     let _revalidation = lifeline.start_revalidation();
//!
//!     let facts = IdentityFacts::new("Test User", "2000-01-01", "+11234567890");
//!     lifeline.auth().login(&facts).await?;
//!
//!     lifeline
//!         .contacts()
//!         .add(&NewContact::new("Mom", "+15550001111"))
//!         .await?;
//!     println!("{} slots left", lifeline.contacts().book().remaining());
//!     Ok(())
//! }
//! ```
//!
//! ## Fallback
//!
//! Outside production, a failed call is retried against
//! [`SimulatedBackend`] when the failure is transient (network, 5xx) or when
//! `LIFELINE_MOCK_API` is set. Authoritative answers (401, 403, 409) are never
//! retried. Production builds never fall back, and neither does a call made
//! with a server-issued token, which the simulation could not recognize.
//!
//! See [`LifelineConfig`] for the environment variables.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Storage layer
pub mod storage;

// Session layer
pub mod session;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Fallback and simulation
pub mod fallback;
pub mod simulation;

// Services
pub mod services;

// Policy layer
pub mod policy;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{BuildMode, LifelineConfig};
pub use errors::LifelineError;
pub use manager::{Lifeline, LifelineBuilder};
pub use policy::navigation::{RequestOrigin, Resolution, Route};
pub use protocol::models::{Contact, IdentityFacts, NewContact, UserProfile, MAX_CONTACTS};
pub use session::validator::{AuthState, Gate};
pub use simulation::backend::SimulatedBackend;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
