//! Application-facing operations built on the client, fallback and session.

pub mod auth;
pub mod contacts;
