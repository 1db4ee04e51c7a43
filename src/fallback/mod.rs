//! Simulation fallback for failed remote calls.

pub mod dispatcher;
