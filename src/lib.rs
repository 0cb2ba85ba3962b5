//! Pre-start alerts for sports events from historical odds movement.
//!
//! For an event about to start, the opening→final odds movement is compared
//! against finished events that moved the same way. If their results agree,
//! a prediction with a confidence score is produced and delivered.

pub mod candidate;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod health;
pub mod lookup;
pub mod notify;
pub mod outcome;
pub mod report;
pub mod scoring;
pub mod service;
pub mod store;
pub mod symmetry;
pub mod variation;

pub use candidate::{HistoricalCandidate, MatchTier, WinnerSide};
pub use engine::AlertEngine;
pub use event::UpcomingEvent;
pub use lookup::{find_candidates, CandidateSets, CandidateSource, InMemoryCandidateSource};
pub use outcome::{classify, OutcomeTier, OutcomeTiers};
pub use report::AlertReport;
pub use scoring::{evaluate, EvaluationResult, EvaluationStatus, Prediction};
pub use symmetry::is_symmetrical;
pub use variation::{EventOdds, VariationVector};
