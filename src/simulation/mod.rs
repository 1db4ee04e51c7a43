//! Local simulation of the Lifeline API for development builds.

pub mod backend;
