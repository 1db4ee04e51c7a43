//! Session state: credential storage and validation.

pub mod format;
pub mod store;
pub mod validator;
