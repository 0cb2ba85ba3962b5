//! Confidence scoring and prediction.
//!
//! [`evaluate`] is a pure function of the query vector and the candidate sets
//! returned by the lookup.

use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::candidate::{HistoricalCandidate, MatchTier, WinnerSide};
use crate::lookup::CandidateSets;
use crate::outcome::{classify, group_by, largest, OutcomeTier, OutcomeTiers};
use crate::symmetry::is_symmetrical;
use crate::variation::VariationVector;

/// Weight of a Tier A member; the denominator of the confidence percentage.
pub const MAX_WEIGHT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Success,
    Partial,
    NoMatch,
    NoCandidates,
}

impl EvaluationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStatus::Success => "success",
            EvaluationStatus::Partial => "partial",
            EvaluationStatus::NoMatch => "no_match",
            EvaluationStatus::NoCandidates => "no_candidates",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLabel::High => "high",
            ConfidenceLabel::Medium => "medium",
            ConfidenceLabel::Low => "low",
        }
    }
}

/// Predicted margin: a shared exact value or a weighted average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointDiff {
    Exact(i32),
    Average(f64),
}

impl fmt::Display for PointDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointDiff::Exact(v) => write!(f, "{}", v),
            PointDiff::Average(v) => write!(f, "{:.2}", v),
        }
    }
}

impl Serialize for PointDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PointDiff::Exact(v) => serializer.serialize_i32(*v),
            PointDiff::Average(v) => serializer.serialize_f64(*v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub rule_type: OutcomeTier,
    pub text: String,
    pub winner_side: WinnerSide,
    pub point_diff: PointDiff,
    pub exact_score: Option<String>,
    pub sample_count: usize,
    pub confidence_label: ConfidenceLabel,
}

/// Terminal output of one event's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub status: EvaluationStatus,
    pub selected_match_tier: Option<MatchTier>,
    pub prediction: Option<Prediction>,
    pub confidence_percent: f64,
    pub successful_count: usize,
    pub total_count: usize,
    pub non_symmetrical_excluded_count: usize,
    pub outcome: OutcomeTiers,
}

impl EvaluationResult {
    fn empty(status: EvaluationStatus) -> Self {
        Self {
            status,
            selected_match_tier: None,
            prediction: None,
            confidence_percent: 0.0,
            successful_count: 0,
            total_count: 0,
            non_symmetrical_excluded_count: 0,
            outcome: OutcomeTiers::default(),
        }
    }
}

/// `(4|A| + 3|B| + 2|C|) / (4 * total) * 100`.
pub fn confidence_percent(tiers: &OutcomeTiers, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(tiers.weighted_total()) / f64::from(MAX_WEIGHT * total as u32) * 100.0
}

/// Select a match tier, classify its candidates and score the result.
pub fn evaluate(query: &VariationVector, sets: &CandidateSets) -> EvaluationResult {
    let (tier, selected, excluded): (MatchTier, Vec<HistoricalCandidate>, usize) =
        if !sets.tier1.is_empty() {
            (MatchTier::Exact, sets.tier1.clone(), 0)
        } else if !sets.tier2.is_empty() {
            let (symmetrical, skewed): (Vec<_>, Vec<_>) = sets
                .tier2
                .iter()
                .cloned()
                .partition(|c| is_symmetrical(query, &c.variations));
            for c in &skewed {
                debug!(
                    event_id = c.event_id,
                    "Non-symmetrical: {} ({})",
                    c.participants,
                    c.variations.display()
                );
            }
            (MatchTier::Similar, symmetrical, skewed.len())
        } else {
            return EvaluationResult::empty(EvaluationStatus::NoCandidates);
        };

    info!(
        "Using {} for evaluation ({} candidates, {} non-symmetrical excluded)",
        tier.label(),
        selected.len(),
        excluded
    );

    let total = selected.len();
    let mut result = EvaluationResult {
        selected_match_tier: Some(tier),
        non_symmetrical_excluded_count: excluded,
        total_count: total,
        ..EvaluationResult::empty(EvaluationStatus::NoMatch)
    };

    if total == 1 {
        result.status = EvaluationStatus::Partial;
        result.successful_count = 1;
        return result;
    }

    let tiers = classify(&selected);
    let matched = tiers.matched();

    if total > 0 && matched == total {
        result.successful_count = total;
        match build_prediction(&selected, &tiers) {
            Some(prediction) => {
                result.status = EvaluationStatus::Success;
                result.confidence_percent = confidence_percent(&tiers, total);
                info!(
                    "Rule {} matched: {} ({:.1}%)",
                    prediction.rule_type.letter(),
                    prediction.text,
                    result.confidence_percent
                );
                result.prediction = Some(prediction);
            }
            None => result.status = EvaluationStatus::Partial,
        }
    } else {
        result.status = EvaluationStatus::NoMatch;
        result.successful_count = matched;
        info!("No match: {}/{} candidates fit a pattern", matched, total);
    }

    result.outcome = tiers;
    result
}

/// Prediction from the highest-priority populated tier.
pub fn build_prediction(
    selected: &[HistoricalCandidate],
    tiers: &OutcomeTiers,
) -> Option<Prediction> {
    match tiers.leading()? {
        OutcomeTier::Identical => {
            let groups = group_by(selected.iter(), |c| c.result_text.clone());
            if groups.len() == 1 {
                let sample = groups[0].1[0];
                let text = if sample.winner_side == WinnerSide::Draw {
                    "Draw".to_string()
                } else if sample.point_diff > 0 {
                    format!(
                        "{} wins by point differential of: {}",
                        sample.winner_side.display_name(),
                        sample.point_diff
                    )
                } else {
                    format!("Exact score: {}", sample.result_text)
                };
                return Some(Prediction {
                    rule_type: OutcomeTier::Identical,
                    text,
                    winner_side: sample.winner_side,
                    point_diff: PointDiff::Exact(sample.point_diff),
                    exact_score: Some(sample.result_text.clone()),
                    sample_count: selected.len(),
                    confidence_label: ConfidenceLabel::High,
                });
            }

            let (result_text, members) = largest(group_by(tiers.a.iter(), |c| c.result_text.clone()))?;
            let sample = members[0];
            let avg = PointDiff::Average(tiers.weighted_point_diff());
            Some(Prediction {
                rule_type: OutcomeTier::Identical,
                text: margin_text(sample.winner_side, avg),
                winner_side: sample.winner_side,
                point_diff: avg,
                exact_score: Some(result_text),
                sample_count: tiers.a.len(),
                confidence_label: ConfidenceLabel::High,
            })
        }
        OutcomeTier::SameWinnerMargin => {
            let sample = tiers.b.first()?;
            let diff = PointDiff::Exact(sample.point_diff);
            Some(Prediction {
                rule_type: OutcomeTier::SameWinnerMargin,
                text: margin_text(sample.winner_side, diff),
                winner_side: sample.winner_side,
                point_diff: diff,
                exact_score: None,
                sample_count: tiers.b.len(),
                confidence_label: ConfidenceLabel::Medium,
            })
        }
        OutcomeTier::SameWinningSide => {
            let sample = tiers.c.first()?;
            let avg = PointDiff::Average(uniform_average(&tiers.c));
            Some(Prediction {
                rule_type: OutcomeTier::SameWinningSide,
                text: margin_text(sample.winner_side, avg),
                winner_side: sample.winner_side,
                point_diff: avg,
                exact_score: None,
                sample_count: tiers.c.len(),
                confidence_label: ConfidenceLabel::Low,
            })
        }
    }
}

fn margin_text(side: WinnerSide, diff: PointDiff) -> String {
    if side == WinnerSide::Draw {
        return "Draw".to_string();
    }
    format!("{} wins by point differential of: {}", side.display_name(), diff)
}

/// Tier C average; every member carries the same weight.
fn uniform_average(members: &[HistoricalCandidate]) -> f64 {
    let weight = f64::from(OutcomeTier::SameWinningSide.weight());
    let total_weight = weight * members.len() as f64;
    if total_weight == 0.0 {
        return 0.0;
    }
    members
        .iter()
        .map(|c| f64::from(c.point_diff) * weight)
        .sum::<f64>()
        / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(event_id: i64, result: &str, side: WinnerSide, diff: i32) -> HistoricalCandidate {
        HistoricalCandidate {
            event_id,
            participants: format!("Home{} vs Away{}", event_id, event_id),
            result_text: result.to_string(),
            winner_side: side,
            point_diff: diff,
            variations: VariationVector::three_way(0.10, 0.02, -0.12),
            sport: "Football".to_string(),
        }
    }

    fn query() -> VariationVector {
        VariationVector::three_way(0.10, 0.02, -0.12)
    }

    fn tier1(list: Vec<HistoricalCandidate>) -> CandidateSets {
        CandidateSets {
            tier1: list,
            tier2: vec![],
        }
    }

    #[test]
    fn draw_prediction_text_is_plain() {
        let sets = tier1(vec![
            cand(1, "1-1", WinnerSide::Draw, 0),
            cand(2, "1-1", WinnerSide::Draw, 0),
        ]);
        let r = evaluate(&query(), &sets);
        assert_eq!(r.prediction.unwrap().text, "Draw");
    }

    #[test]
    fn zero_margin_non_draw_reports_exact_score() {
        let sets = tier1(vec![
            cand(1, "6-4 4-6 6-4", WinnerSide::Home, 0),
            cand(2, "6-4 4-6 6-4", WinnerSide::Home, 0),
        ]);
        let p = evaluate(&query(), &sets).prediction.unwrap();
        assert_eq!(p.text, "Exact score: 6-4 4-6 6-4");
        assert_eq!(p.confidence_label, ConfidenceLabel::High);
    }

    #[test]
    fn mixed_tier_a_uses_weighted_average() {
        // A = {1,2} (2-0), B empty, C = {3} home win by 4 via full-set majority.
        let sets = tier1(vec![
            cand(1, "2-0", WinnerSide::Home, 2),
            cand(2, "2-0", WinnerSide::Home, 2),
            cand(3, "4-0", WinnerSide::Home, 4),
        ]);
        let r = evaluate(&query(), &sets);
        assert_eq!(r.status, EvaluationStatus::Success);
        let p = r.prediction.unwrap();
        // (2*4 + 2*4 + 4*2) / 10 = 2.4
        assert_eq!(p.text, "Home wins by point differential of: 2.40");
        assert_eq!(p.exact_score.as_deref(), Some("2-0"));
        assert_eq!(p.sample_count, 2);
        // (4 + 4 + 2) / 12
        assert!((r.confidence_percent - 83.333_333).abs() < 1e-3);
    }

    #[test]
    fn tier_c_prediction_formats_average() {
        let sets = tier1(vec![
            cand(1, "1-0", WinnerSide::Away, 1),
            cand(2, "0-2", WinnerSide::Away, 2),
        ]);
        let r = evaluate(&query(), &sets);
        let p = r.prediction.unwrap();
        assert_eq!(p.rule_type, OutcomeTier::SameWinningSide);
        assert_eq!(p.text, "Away wins by point differential of: 1.50");
        assert_eq!(p.confidence_label, ConfidenceLabel::Low);
        assert!((r.confidence_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn all_non_symmetrical_tier2_is_no_match() {
        let q = query();
        let sets = CandidateSets {
            tier1: vec![],
            tier2: vec![HistoricalCandidate {
                variations: VariationVector::three_way(0.13, 0.05, -0.16),
                ..cand(1, "2-1", WinnerSide::Home, 1)
            }],
        };
        let r = evaluate(&q, &sets);
        assert_eq!(r.status, EvaluationStatus::NoMatch);
        assert_eq!(r.total_count, 0);
        assert_eq!(r.non_symmetrical_excluded_count, 1);
    }

    #[test]
    fn point_diff_display() {
        assert_eq!(PointDiff::Exact(3).to_string(), "3");
        assert_eq!(PointDiff::Average(1.0).to_string(), "1.00");
    }
}
