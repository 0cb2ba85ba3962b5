//! Outcome tier classification.
//!
//! Candidates are partitioned into A (identical result text), B (same winner
//! and margin) and C (same winning side) in that priority. A candidate lands in
//! at most one tier, and no tier is populated from a group smaller than
//! [`MIN_GROUP_SIZE`].
//!
//! Grouping keeps first-encounter order, so whenever groups tie on size the one
//! whose first member appears earliest in the input wins.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::candidate::{HistoricalCandidate, WinnerSide};

/// Smallest group that can establish a pattern.
pub const MIN_GROUP_SIZE: usize = 2;

/// Result agreement class, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutcomeTier {
    #[serde(rename = "A")]
    Identical,
    #[serde(rename = "B")]
    SameWinnerMargin,
    #[serde(rename = "C")]
    SameWinningSide,
}

impl OutcomeTier {
    pub const ALL: [OutcomeTier; 3] = [
        OutcomeTier::Identical,
        OutcomeTier::SameWinnerMargin,
        OutcomeTier::SameWinningSide,
    ];

    pub fn letter(self) -> &'static str {
        match self {
            OutcomeTier::Identical => "A",
            OutcomeTier::SameWinnerMargin => "B",
            OutcomeTier::SameWinningSide => "C",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutcomeTier::Identical => "Identical Results",
            OutcomeTier::SameWinnerMargin => "Similar Results",
            OutcomeTier::SameWinningSide => "Same Winning Side",
        }
    }

    /// Per-candidate confidence weight.
    pub fn weight(self) -> u32 {
        match self {
            OutcomeTier::Identical => 4,
            OutcomeTier::SameWinnerMargin => 3,
            OutcomeTier::SameWinningSide => 2,
        }
    }
}

/// Disjoint A/B/C partition of one candidate set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutcomeTiers {
    pub a: Vec<HistoricalCandidate>,
    pub b: Vec<HistoricalCandidate>,
    pub c: Vec<HistoricalCandidate>,
}

impl OutcomeTiers {
    pub fn members(&self, tier: OutcomeTier) -> &[HistoricalCandidate] {
        match tier {
            OutcomeTier::Identical => &self.a,
            OutcomeTier::SameWinnerMargin => &self.b,
            OutcomeTier::SameWinningSide => &self.c,
        }
    }

    pub fn matched(&self) -> usize {
        self.a.len() + self.b.len() + self.c.len()
    }

    /// Sum of member weights.
    pub fn weighted_total(&self) -> u32 {
        OutcomeTier::ALL
            .iter()
            .map(|&t| t.weight() * self.members(t).len() as u32)
            .sum()
    }

    /// Weighted mean point differential across all three tiers.
    pub fn weighted_point_diff(&self) -> f64 {
        let total_weight = self.weighted_total();
        if total_weight == 0 {
            return 0.0;
        }
        let weighted: f64 = OutcomeTier::ALL
            .iter()
            .flat_map(|&t| self.members(t).iter().map(move |c| (t, c)))
            .map(|(t, c)| f64::from(c.point_diff) * f64::from(t.weight()))
            .sum();
        weighted / f64::from(total_weight)
    }

    /// Highest-priority tier with members.
    pub fn leading(&self) -> Option<OutcomeTier> {
        OutcomeTier::ALL
            .into_iter()
            .find(|&t| !self.members(t).is_empty())
    }
}

/// Groups in first-encounter order.
pub(crate) fn group_by<'a, K, F>(
    items: impl IntoIterator<Item = &'a HistoricalCandidate>,
    key: F,
) -> Vec<(K, Vec<&'a HistoricalCandidate>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&HistoricalCandidate) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&HistoricalCandidate>)> = Vec::new();
    for item in items {
        let k = key(item);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}

/// Largest group; ties go to the earliest group.
pub(crate) fn largest<K, T>(groups: Vec<(K, Vec<T>)>) -> Option<(K, Vec<T>)> {
    groups.into_iter().fold(None, |best, group| match best {
        Some(b) if b.1.len() >= group.1.len() => Some(b),
        _ => Some(group),
    })
}

/// Partition `candidates` into outcome tiers.
pub fn classify(candidates: &[HistoricalCandidate]) -> OutcomeTiers {
    let mut tiers = OutcomeTiers::default();
    let mut assigned = vec![false; candidates.len()];

    // A: every identical-result group of size >= 2.
    let by_result = group_by(candidates.iter(), |c| c.result_text.clone());
    let identical: std::collections::HashSet<&str> = by_result
        .iter()
        .filter(|(_, members)| members.len() >= MIN_GROUP_SIZE)
        .map(|(k, _)| k.as_str())
        .collect();
    for (i, c) in candidates.iter().enumerate() {
        if identical.contains(c.result_text.as_str()) {
            tiers.a.push(c.clone());
            assigned[i] = true;
        }
    }

    // B: the single largest (winner, margin) group among the remainder.
    let remainder = candidates
        .iter()
        .zip(&assigned)
        .filter(|(_, done)| !**done)
        .map(|(c, _)| c);
    if let Some((key, members)) = largest(group_by(remainder, |c| (c.winner_side, c.point_diff))) {
        if members.len() >= MIN_GROUP_SIZE {
            for (i, c) in candidates.iter().enumerate() {
                if !assigned[i] && (c.winner_side, c.point_diff) == key {
                    tiers.b.push(c.clone());
                    assigned[i] = true;
                }
            }
        }
    }

    // C: majority side over the full set, assigned from the remainder only.
    if let Some(side) = majority_side(candidates) {
        for (i, c) in candidates.iter().enumerate() {
            if !assigned[i] && c.winner_side == side {
                tiers.c.push(c.clone());
                assigned[i] = true;
            }
        }
    }

    tiers
}

/// Most common winning side over `candidates` when it has at least
/// [`MIN_GROUP_SIZE`] members.
pub fn majority_side(candidates: &[HistoricalCandidate]) -> Option<WinnerSide> {
    largest(group_by(candidates.iter(), |c| c.winner_side))
        .filter(|(_, members)| members.len() >= MIN_GROUP_SIZE)
        .map(|(side, _)| side)
}
