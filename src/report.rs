//! Report assembly: one structured report per evaluated event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::candidate::{HistoricalCandidate, MatchTier, WinnerSide};
use crate::event::UpcomingEvent;
use crate::lookup::CandidateSets;
use crate::outcome::OutcomeTier;
use crate::scoring::{EvaluationResult, EvaluationStatus, Prediction};
use crate::symmetry::is_symmetrical;
use crate::variation::VariationVector;

/// A candidate as listed in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEntry {
    pub event_id: i64,
    pub sport: String,
    pub participants: String,
    pub result_text: String,
    pub winner_side: WinnerSide,
    pub point_diff: i32,
    pub variations: VariationVector,
    pub is_symmetrical: bool,
}

impl CandidateEntry {
    fn new(candidate: &HistoricalCandidate, is_symmetrical: bool) -> Self {
        Self {
            event_id: candidate.event_id,
            sport: candidate.sport.clone(),
            participants: candidate.participants.clone(),
            result_text: candidate.result_text.clone(),
            winner_side: candidate.winner_side,
            point_diff: candidate.point_diff,
            variations: candidate.variations,
            is_symmetrical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierListing {
    pub tier: MatchTier,
    pub count: usize,
    pub matches: Vec<CandidateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleActivation {
    pub tier: OutcomeTier,
    pub description: &'static str,
    pub weight: u32,
    pub count: usize,
    pub candidates: Vec<CandidateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub report_id: Uuid,
    pub event_id: i64,
    pub rule_key: String,
    pub participants: String,
    pub competition: String,
    pub sport: String,
    pub start_time: DateTime<Utc>,
    pub minutes_until_start: i64,
    pub odds_display: Option<String>,
    pub variations: VariationVector,
    pub has_draw_odds: bool,
    pub status: EvaluationStatus,
    pub selected_tier: Option<MatchTier>,
    pub prediction: Option<Prediction>,
    pub confidence_percent: f64,
    pub successful_count: usize,
    pub total_count: usize,
    pub non_symmetrical_excluded_count: usize,
    pub rule_activations: Vec<RuleActivation>,
    pub tier1: TierListing,
    pub tier2: TierListing,
    pub generated_at: DateTime<Utc>,
}

impl AlertReport {
    pub fn rule_key_for(event_id: i64) -> String {
        format!("candidate_report_{}", event_id)
    }

    pub fn assemble(
        event: &UpcomingEvent,
        vector: &VariationVector,
        sets: &CandidateSets,
        evaluation: EvaluationResult,
        now: DateTime<Utc>,
    ) -> Self {
        // Tier 1 members are symmetrical by definition (zero shift).
        let tier1 = TierListing {
            tier: MatchTier::Exact,
            count: sets.tier1.len(),
            matches: sets.tier1.iter().map(|c| CandidateEntry::new(c, true)).collect(),
        };
        let tier2 = TierListing {
            tier: MatchTier::Similar,
            count: sets.tier2.len(),
            matches: sets
                .tier2
                .iter()
                .map(|c| CandidateEntry::new(c, is_symmetrical(vector, &c.variations)))
                .collect(),
        };

        let rule_activations = OutcomeTier::ALL
            .iter()
            .filter_map(|&tier| {
                let members = evaluation.outcome.members(tier);
                if members.is_empty() {
                    return None;
                }
                Some(RuleActivation {
                    tier,
                    description: tier.description(),
                    weight: tier.weight(),
                    count: members.len(),
                    candidates: members.iter().map(|c| CandidateEntry::new(c, true)).collect(),
                })
            })
            .collect();

        Self {
            report_id: Uuid::new_v4(),
            event_id: event.id,
            rule_key: Self::rule_key_for(event.id),
            participants: event.participants(),
            competition: event.competition.clone(),
            sport: event.sport.clone(),
            start_time: event.start_time,
            minutes_until_start: event.minutes_until_start(now),
            odds_display: event.odds.as_ref().and_then(|o| o.display()),
            variations: *vector,
            has_draw_odds: vector.x.is_some(),
            status: evaluation.status,
            selected_tier: evaluation.selected_match_tier,
            prediction: evaluation.prediction,
            confidence_percent: evaluation.confidence_percent,
            successful_count: evaluation.successful_count,
            total_count: evaluation.total_count,
            non_symmetrical_excluded_count: evaluation.non_symmetrical_excluded_count,
            rule_activations,
            tier1,
            tier2,
            generated_at: now,
        }
    }

    pub fn primary_prediction(&self) -> Option<&str> {
        self.prediction.as_ref().map(|p| p.text.as_str())
    }

    pub fn primary_confidence(&self) -> String {
        format!("{:.1}%", self.confidence_percent)
    }

    pub fn vars_display(&self) -> String {
        self.variations.display()
    }

    /// Listing for the tier the evaluation used.
    pub fn selected_listing(&self) -> Option<&TierListing> {
        match self.selected_tier? {
            MatchTier::Exact => Some(&self.tier1),
            MatchTier::Similar => Some(&self.tier2),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EvaluationStatus::Success
    }
}
