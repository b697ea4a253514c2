//! Domain layer for the Foresight anticipation engine
//!
//! Observations, patterns, scenarios and the ports the engines depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
