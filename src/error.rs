//! Error types for the alert engine and its collaborators.
//!
//! Absence of a prediction is never an error: it is carried as an
//! [`EvaluationStatus`](crate::scoring::EvaluationStatus). The enums here cover
//! data that cannot be evaluated at all and failing infrastructure.

use thiserror::Error;

/// The current event cannot be turned into a variation vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariationError {
    #[error("no odds recorded for event")]
    NoOdds,

    #[error("missing {stage} price for choice '{choice}'")]
    MissingPrice {
        choice: &'static str,
        stage: &'static str,
    },
}

/// A historical row that cannot be used as a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("candidate {event_id}: missing field {field}")]
    MissingField { event_id: i64, field: &'static str },

    #[error("candidate {event_id}: unknown winner side '{value}'")]
    UnknownWinner { event_id: i64, value: String },

    #[error("candidate {event_id}: non-finite variation")]
    NonFinite { event_id: i64 },
}

/// The candidate source could not be queried.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("candidate source unavailable: {0}")]
    Unavailable(String),

    #[error("candidate query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// A report could not be delivered by a sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery rejected (status={status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence failures outside the candidate lookup.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event id {0} does not fit the alert log column")]
    EventIdOutOfRange(i64),
}
