//! Per-event orchestration: variations → lookup → evaluation → report.
//!
//! The engine carries no per-call state. Lookup failures degrade to an empty
//! candidate set and are never surfaced to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::VariationError;
use crate::event::UpcomingEvent;
use crate::lookup::{find_candidates, CandidateSets, CandidateSource};
use crate::report::AlertReport;
use crate::scoring::evaluate;
use crate::variation::EventOdds;

#[derive(Clone)]
pub struct AlertEngine {
    source: Arc<dyn CandidateSource>,
}

impl AlertEngine {
    pub fn new(source: Arc<dyn CandidateSource>) -> Self {
        Self { source }
    }

    /// Evaluate one upcoming event. Returns `None` when the event has no usable
    /// variations; every other outcome, including "no candidates", is a report.
    pub async fn evaluate_event(
        &self,
        event: &UpcomingEvent,
        now: DateTime<Utc>,
    ) -> Option<AlertReport> {
        let span = info_span!("evaluate", event_id = event.id, sport = %event.sport);
        self.evaluate_inner(event, now).instrument(span).await
    }

    async fn evaluate_inner(&self, event: &UpcomingEvent, now: DateTime<Utc>) -> Option<AlertReport> {
        let variations = event
            .odds
            .as_ref()
            .ok_or(VariationError::NoOdds)
            .and_then(EventOdds::variations);

        let vector = match variations {
            Ok(v) => v,
            Err(e) => {
                debug!("No variations for event {}: {}", event.id, e);
                return None;
            }
        };

        info!(
            "Event {} ({}) vars: {} shape={}",
            event.id,
            event.participants(),
            vector.display(),
            vector.shape().label()
        );

        let sets = match find_candidates(self.source.as_ref(), &event.sport, &vector, &[event.id]).await
        {
            Ok(sets) => sets,
            Err(e) => {
                warn!("Candidate lookup failed for event {}, treating as no candidates: {}", event.id, e);
                CandidateSets::default()
            }
        };

        if sets.is_empty() {
            info!("No candidates found for event {}", event.id);
        }

        let evaluation = evaluate(&vector, &sets);
        Some(AlertReport::assemble(event, &vector, &sets, evaluation, now))
    }

    /// Evaluate a batch sequentially, skipping events without variations.
    pub async fn evaluate_events(
        &self,
        events: &[UpcomingEvent],
        now: DateTime<Utc>,
    ) -> Vec<AlertReport> {
        let mut reports = Vec::with_capacity(events.len());
        for event in events {
            if let Some(report) = self.evaluate_event(event, now).await {
                reports.push(report);
            }
        }
        info!("Evaluated {}/{} upcoming events", reports.len(), events.len());
        reports
    }
}
