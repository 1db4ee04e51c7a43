//! Policies applied on top of transport results.

pub mod navigation;
