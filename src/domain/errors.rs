//! Domain errors for the Foresight anticipation engine.
//!
//! Only caller contract violations and collaborator failures are errors.
//! Insufficient data never is: engines answer with empty results instead.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the Foresight system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid timeframe: end {end} is before start {start}")]
    InvalidTimeframe {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid observation {id}: {reason}")]
    InvalidObservation { id: Uuid, reason: String },

    #[error("Invalid calendar event '{id}': {reason}")]
    InvalidCalendarEvent { id: String, reason: String },

    #[error("Invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),

    #[error("Pattern not found: {0}")]
    PatternNotFound(Uuid),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
