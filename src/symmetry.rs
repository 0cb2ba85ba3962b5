//! Symmetry check for tolerance matches.
//!
//! A Tier 2 candidate is symmetrical when its vector equals the query's plus one
//! uniform shift, i.e. the whole market moved together.

use crate::variation::VariationVector;

/// Largest allowed difference between two per-component shifts.
pub const SYMMETRY_EPSILON: f64 = 0.001;

pub fn is_symmetrical(query: &VariationVector, candidate: &VariationVector) -> bool {
    let d1 = candidate.one - query.one;
    let d2 = candidate.two - query.two;

    // Mixed shapes never reach here from a lookup; they fall back to a zero draw shift.
    let dx = match (query.x, candidate.x) {
        (Some(qx), Some(cx)) => cx - qx,
        _ => 0.0,
    };

    if query.x.is_none() && candidate.x.is_none() {
        return (d1 - d2).abs() < SYMMETRY_EPSILON;
    }

    (d1 - d2).abs() < SYMMETRY_EPSILON
        && (d1 - dx).abs() < SYMMETRY_EPSILON
        && (d2 - dx).abs() < SYMMETRY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_shift_is_symmetrical() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let c = VariationVector::three_way(0.13, 0.05, -0.09);
        assert!(is_symmetrical(&q, &c));
    }

    #[test]
    fn uneven_shift_is_not() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let c = VariationVector::three_way(0.13, 0.05, -0.16);
        assert!(!is_symmetrical(&q, &c));
    }

    #[test]
    fn two_way_compares_home_and_away_only() {
        let q = VariationVector::two_way(0.37, -1.13);
        assert!(is_symmetrical(&q, &VariationVector::two_way(0.35, -1.15)));
        assert!(!is_symmetrical(&q, &VariationVector::two_way(0.35, -1.11)));
    }

    #[test]
    fn identical_vectors_are_symmetrical() {
        let q = VariationVector::three_way(0.37, -0.30, -1.13);
        assert!(is_symmetrical(&q, &q));
    }

    #[test]
    fn verdict_survives_common_shift_and_swap() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let c = VariationVector::three_way(0.13, 0.05, -0.09);
        let shift = |v: &VariationVector, k: f64| {
            VariationVector::new(v.one + k, v.x.map(|x| x + k), v.two + k)
        };
        for k in [-0.2, 0.0, 0.07, 1.5] {
            assert_eq!(is_symmetrical(&shift(&q, k), &shift(&c, k)), is_symmetrical(&q, &c));
        }
        assert_eq!(is_symmetrical(&c, &q), is_symmetrical(&q, &c));
    }
}
