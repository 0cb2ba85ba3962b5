//! Candidate lookup over the historical index.
//!
//! Sources only have to answer one tier at a time; [`find_candidates`] runs
//! Tier 1 and then Tier 2 with Tier 1's ids excluded, and re-applies the full
//! predicate to whatever a source returns.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidate::{CandidateQuery, CandidateRow, HistoricalCandidate, MatchTier};
use crate::error::LookupError;
use crate::variation::VariationVector;

/// Read-only query service over finished events.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn find_tier(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<HistoricalCandidate>, LookupError>;
}

/// Tier 1 and Tier 2 candidates for one query. The two lists never share an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateSets {
    pub tier1: Vec<HistoricalCandidate>,
    pub tier2: Vec<HistoricalCandidate>,
}

impl CandidateSets {
    pub fn is_empty(&self) -> bool {
        self.tier1.is_empty() && self.tier2.is_empty()
    }
}

/// Look up both tiers for `vector`. `exclude_ids` must contain the query
/// event's own id.
///
/// A tier whose query fails is logged and treated as empty so the other tier
/// can still drive the evaluation. Only when both tiers fail is the error
/// returned.
pub async fn find_candidates(
    source: &dyn CandidateSource,
    sport: &str,
    vector: &VariationVector,
    exclude_ids: &[i64],
) -> Result<CandidateSets, LookupError> {
    let shape = vector.shape();

    let tier1_query = CandidateQuery {
        sport,
        shape,
        vector: *vector,
        tier: MatchTier::Exact,
        exclude_ids,
    };
    let (tier1, tier1_err) = tier_or_empty(&tier1_query, source.find_tier(&tier1_query).await);

    let mut tier2_exclude = exclude_ids.to_vec();
    tier2_exclude.extend(tier1.iter().map(|c| c.event_id));

    let tier2_query = CandidateQuery {
        sport,
        shape,
        vector: *vector,
        tier: MatchTier::Similar,
        exclude_ids: &tier2_exclude,
    };
    let (tier2, tier2_err) = tier_or_empty(&tier2_query, source.find_tier(&tier2_query).await);

    if let (Some(e), Some(_)) = (tier1_err, tier2_err) {
        return Err(e);
    }

    info!(
        sport,
        shape = shape.label(),
        tier1 = tier1.len(),
        tier2 = tier2.len(),
        "Candidate lookup complete"
    );

    Ok(CandidateSets { tier1, tier2 })
}

fn tier_or_empty(
    query: &CandidateQuery<'_>,
    found: Result<Vec<HistoricalCandidate>, LookupError>,
) -> (Vec<HistoricalCandidate>, Option<LookupError>) {
    match found {
        Ok(found) => (accept_all(query, found), None),
        Err(e) => {
            warn!(tier = ?query.tier, "Candidate lookup failed, continuing without this tier: {}", e);
            (Vec::new(), Some(e))
        }
    }
}

fn accept_all(
    query: &CandidateQuery<'_>,
    found: Vec<HistoricalCandidate>,
) -> Vec<HistoricalCandidate> {
    let mut seen = std::collections::HashSet::new();
    found
        .into_iter()
        .filter(|c| {
            let ok = query.accepts(c) && seen.insert(c.event_id);
            if !ok {
                debug!(event_id = c.event_id, tier = ?query.tier, "Dropping candidate outside query");
            }
            ok
        })
        .collect()
}

/// Convert raw rows, dropping malformed ones, and keep those the query accepts.
pub fn collect_candidates(
    query: &CandidateQuery<'_>,
    rows: impl IntoIterator<Item = CandidateRow>,
) -> Vec<HistoricalCandidate> {
    rows.into_iter()
        .filter_map(|row| match HistoricalCandidate::try_from(row) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Skipping malformed candidate: {}", e);
                None
            }
        })
        .filter(|c| query.accepts(c))
        .collect()
}

/// Candidate source backed by rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidateSource {
    rows: Vec<CandidateRow>,
}

impl InMemoryCandidateSource {
    pub fn new(rows: Vec<CandidateRow>) -> Self {
        Self { rows }
    }

    pub fn from_candidates(candidates: impl IntoIterator<Item = HistoricalCandidate>) -> Self {
        Self::new(candidates.into_iter().map(CandidateRow::from).collect())
    }

    pub fn push(&mut self, row: CandidateRow) {
        self.rows.push(row);
    }
}

#[async_trait]
impl CandidateSource for InMemoryCandidateSource {
    async fn find_tier(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<HistoricalCandidate>, LookupError> {
        Ok(collect_candidates(query, self.rows.iter().cloned()))
    }
}

impl From<HistoricalCandidate> for CandidateRow {
    fn from(c: HistoricalCandidate) -> Self {
        Self {
            event_id: c.event_id,
            sport: Some(c.sport),
            participants: Some(c.participants),
            result_text: Some(c.result_text),
            winner_side: Some(c.winner_side.code().to_string()),
            point_diff: Some(c.point_diff),
            var_one: Some(c.variations.one),
            var_x: c.variations.x,
            var_two: Some(c.variations.two),
        }
    }
}
