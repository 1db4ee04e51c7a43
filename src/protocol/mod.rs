//! Wire types for the Lifeline API.

pub mod models;
