//! Finished historical events and the two similarity tiers used to match them.

use serde::{Deserialize, Serialize};

use crate::error::CandidateError;
use crate::variation::{hundredths, Shape, VariationVector};

/// Maximum absolute per-component difference for a Tier 2 match (inclusive).
pub const TIER2_TOLERANCE: f64 = 0.04;

/// Which side won a finished event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinnerSide {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl WinnerSide {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(WinnerSide::Home),
            "X" | "x" => Some(WinnerSide::Draw),
            "2" => Some(WinnerSide::Away),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            WinnerSide::Home => "1",
            WinnerSide::Draw => "X",
            WinnerSide::Away => "2",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            WinnerSide::Home => "Home",
            WinnerSide::Draw => "Draw",
            WinnerSide::Away => "Away",
        }
    }
}

/// Immutable snapshot of a finished event with a final score and known variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCandidate {
    pub event_id: i64,
    pub participants: String,
    pub result_text: String,
    pub winner_side: WinnerSide,
    pub point_diff: i32,
    pub variations: VariationVector,
    pub sport: String,
}

/// Raw row from the historical index. Every column is optional so a damaged
/// record can be rejected on its own instead of failing the whole query.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct CandidateRow {
    pub event_id: i64,
    pub sport: Option<String>,
    pub participants: Option<String>,
    pub result_text: Option<String>,
    pub winner_side: Option<String>,
    pub point_diff: Option<i32>,
    pub var_one: Option<f64>,
    pub var_x: Option<f64>,
    pub var_two: Option<f64>,
}

impl TryFrom<CandidateRow> for HistoricalCandidate {
    type Error = CandidateError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let event_id = row.event_id;
        let missing = |field| CandidateError::MissingField { event_id, field };

        let result_text = row
            .result_text
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("result_text"))?;
        let winner_raw = row.winner_side.ok_or_else(|| missing("winner_side"))?;
        let winner_side =
            WinnerSide::from_code(&winner_raw).ok_or(CandidateError::UnknownWinner {
                event_id,
                value: winner_raw.clone(),
            })?;
        let point_diff = row.point_diff.ok_or_else(|| missing("point_diff"))?;
        let one = row.var_one.ok_or_else(|| missing("var_one"))?;
        let two = row.var_two.ok_or_else(|| missing("var_two"))?;

        let variations = VariationVector::new(one, row.var_x, two);
        if !variations.is_finite() {
            return Err(CandidateError::NonFinite { event_id });
        }

        Ok(Self {
            event_id,
            participants: row.participants.unwrap_or_else(|| "? vs ?".to_string()),
            result_text,
            winner_side,
            point_diff,
            variations,
            sport: row.sport.unwrap_or_default(),
        })
    }
}

/// Similarity tier between a query vector and a candidate's vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Every present component identical.
    Exact,
    /// Every present component within [`TIER2_TOLERANCE`].
    Similar,
}

impl MatchTier {
    pub fn label(self) -> &'static str {
        match self {
            MatchTier::Exact => "Tier 1 (exact variations)",
            MatchTier::Similar => "Tier 2 (similar variations)",
        }
    }

    /// Tier predicate on quantised values. Vectors of different shape never match.
    pub fn matches(self, query: &VariationVector, candidate: &VariationVector) -> bool {
        if query.shape() != candidate.shape() {
            return false;
        }

        let within = |a: f64, b: f64| match self {
            MatchTier::Exact => hundredths(a) == hundredths(b),
            MatchTier::Similar => (hundredths(a) - hundredths(b)).abs() <= hundredths(TIER2_TOLERANCE),
        };

        let draw_ok = match (query.x, candidate.x) {
            (Some(q), Some(c)) => within(q, c),
            (None, None) => true,
            _ => false,
        };

        within(query.one, candidate.one) && within(query.two, candidate.two) && draw_ok
    }
}

/// One tier's lookup request.
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub sport: &'a str,
    pub shape: Shape,
    pub vector: VariationVector,
    pub tier: MatchTier,
    pub exclude_ids: &'a [i64],
}

impl CandidateQuery<'_> {
    /// Full in-process predicate: sport, shape, tier and exclusions.
    pub fn accepts(&self, candidate: &HistoricalCandidate) -> bool {
        candidate.sport == self.sport
            && candidate.variations.shape() == self.shape
            && !self.exclude_ids.contains(&candidate.event_id)
            && self.tier.matches(&self.vector, &candidate.variations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(event_id: i64) -> CandidateRow {
        CandidateRow {
            event_id,
            sport: Some("Football".into()),
            participants: Some("A vs B".into()),
            result_text: Some("2-1".into()),
            winner_side: Some("1".into()),
            point_diff: Some(1),
            var_one: Some(0.10),
            var_x: Some(0.02),
            var_two: Some(-0.12),
        }
    }

    #[test]
    fn converts_complete_row() {
        let c = HistoricalCandidate::try_from(row(7)).unwrap();
        assert_eq!(c.event_id, 7);
        assert_eq!(c.winner_side, WinnerSide::Home);
        assert_eq!(c.variations.shape(), Shape::ThreeWay);
    }

    #[test]
    fn rejects_row_without_result() {
        let mut r = row(3);
        r.result_text = None;
        assert_eq!(
            HistoricalCandidate::try_from(r),
            Err(CandidateError::MissingField {
                event_id: 3,
                field: "result_text"
            })
        );
    }

    #[test]
    fn rejects_unknown_winner() {
        let mut r = row(4);
        r.winner_side = Some("H".into());
        assert!(matches!(
            HistoricalCandidate::try_from(r),
            Err(CandidateError::UnknownWinner { event_id: 4, .. })
        ));
    }

    #[test]
    fn exact_tier_requires_identical_components() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        assert!(MatchTier::Exact.matches(&q, &VariationVector::three_way(0.10, 0.02, -0.12)));
        assert!(!MatchTier::Exact.matches(&q, &VariationVector::three_way(0.11, 0.02, -0.12)));
    }

    #[test]
    fn similar_tier_tolerance_is_inclusive() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        assert!(MatchTier::Similar.matches(&q, &VariationVector::three_way(0.14, -0.02, -0.08)));
        assert!(!MatchTier::Similar.matches(&q, &VariationVector::three_way(0.15, 0.02, -0.12)));
    }

    #[test]
    fn shapes_never_cross_match() {
        let three = VariationVector::three_way(0.10, 0.00, -0.12);
        let two = VariationVector::two_way(0.10, -0.12);
        assert!(!MatchTier::Exact.matches(&three, &two));
        assert!(!MatchTier::Similar.matches(&two, &three));
    }

    #[test]
    fn winner_codes_round_trip() {
        for side in [WinnerSide::Home, WinnerSide::Draw, WinnerSide::Away] {
            assert_eq!(WinnerSide::from_code(side.code()), Some(side));
        }
        assert_eq!(WinnerSide::Draw.display_name(), "Draw");
    }
}
