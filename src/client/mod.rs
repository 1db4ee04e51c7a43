//! HTTP transport for the Lifeline API.

pub mod http;
