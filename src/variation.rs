//! Odds-movement vectors.
//!
//! A variation is `final - open` for one market choice. Prices are stored at
//! two decimal places, so every value entering or leaving this module is
//! quantised to hundredths; equality and tolerance checks elsewhere rely on it.

use serde::{Deserialize, Serialize};

use crate::error::VariationError;

/// Round a price or variation to two decimal places.
pub fn quantize(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Integer hundredths of an already-quantised value.
pub fn hundredths(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Whether the market offers a draw choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    ThreeWay,
    TwoWay,
}

impl Shape {
    pub fn has_draw(self) -> bool {
        matches!(self, Shape::ThreeWay)
    }

    pub fn label(self) -> &'static str {
        match self {
            Shape::ThreeWay => "3-way",
            Shape::TwoWay => "no-draw",
        }
    }
}

/// Signed opening-to-final price change per market choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariationVector {
    pub one: f64,
    pub x: Option<f64>,
    pub two: f64,
}

impl VariationVector {
    pub fn new(one: f64, x: Option<f64>, two: f64) -> Self {
        Self {
            one: quantize(one),
            x: x.map(quantize),
            two: quantize(two),
        }
    }

    pub fn three_way(one: f64, x: f64, two: f64) -> Self {
        Self::new(one, Some(x), two)
    }

    pub fn two_way(one: f64, two: f64) -> Self {
        Self::new(one, None, two)
    }

    pub fn shape(&self) -> Shape {
        if self.x.is_some() {
            Shape::ThreeWay
        } else {
            Shape::TwoWay
        }
    }

    pub fn is_finite(&self) -> bool {
        self.one.is_finite() && self.two.is_finite() && self.x.map_or(true, f64::is_finite)
    }

    /// `Δ1: 0.10, ΔX: 0.02, Δ2: -0.12`; the draw term is omitted for two-way markets.
    pub fn display(&self) -> String {
        let mut out = format!("Δ1: {:.2}", self.one);
        if let Some(x) = self.x {
            out.push_str(&format!(", ΔX: {:.2}", x));
        }
        out.push_str(&format!(", Δ2: {:.2}", self.two));
        out
    }

    /// Signed per-choice offset from `query`, e.g. `Δ1: +0.03, ΔX: +0.03, Δ2: -0.04`.
    /// The draw term is shown only when both vectors have one.
    pub fn differences_from(&self, query: &VariationVector) -> String {
        let offset = |c: f64, q: f64| (hundredths(c) - hundredths(q)) as f64 / 100.0;
        let mut out = format!("Δ1: {:+.2}", offset(self.one, query.one));
        if let (Some(c), Some(q)) = (self.x, query.x) {
            out.push_str(&format!(", ΔX: {:+.2}", offset(c, q)));
        }
        out.push_str(&format!(", Δ2: {:+.2}", offset(self.two, query.two)));
        out
    }
}

/// Opening and final 1X2 prices for one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOdds {
    pub one_open: Option<f64>,
    pub x_open: Option<f64>,
    pub two_open: Option<f64>,
    pub one_final: Option<f64>,
    pub x_final: Option<f64>,
    pub two_final: Option<f64>,
}

impl EventOdds {
    /// Build the variation vector. The draw term is present only when both its
    /// opening and final prices are known.
    pub fn variations(&self) -> Result<VariationVector, VariationError> {
        let one = movement(self.one_open, self.one_final, "1")?;
        let two = movement(self.two_open, self.two_final, "2")?;
        let x = match (self.x_open, self.x_final) {
            (Some(open), Some(fin)) => Some(quantize(fin) - quantize(open)),
            _ => None,
        };
        Ok(VariationVector::new(one, x, two))
    }

    /// `1: 1.85→1.75, X: 3.40→3.60, 2: 4.20→4.50`, or `None` when a required
    /// price is missing.
    pub fn display(&self) -> Option<String> {
        let (one_open, one_final) = (self.one_open?, self.one_final?);
        let (two_open, two_final) = (self.two_open?, self.two_final?);

        let mut out = format!("1: {:.2}→{:.2}", one_open, one_final);
        if let (Some(x_open), Some(x_final)) = (self.x_open, self.x_final) {
            out.push_str(&format!(", X: {:.2}→{:.2}", x_open, x_final));
        }
        out.push_str(&format!(", 2: {:.2}→{:.2}", two_open, two_final));
        Some(out)
    }
}

fn movement(
    open: Option<f64>,
    fin: Option<f64>,
    choice: &'static str,
) -> Result<f64, VariationError> {
    let open = open.ok_or(VariationError::MissingPrice {
        choice,
        stage: "opening",
    })?;
    let fin = fin.ok_or(VariationError::MissingPrice {
        choice,
        stage: "final",
    })?;
    Ok(quantize(fin) - quantize(open))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odds(one: (f64, f64), x: Option<(f64, f64)>, two: (f64, f64)) -> EventOdds {
        EventOdds {
            one_open: Some(one.0),
            one_final: Some(one.1),
            x_open: x.map(|p| p.0),
            x_final: x.map(|p| p.1),
            two_open: Some(two.0),
            two_final: Some(two.1),
        }
    }

    #[test]
    fn three_way_variations_are_final_minus_open() {
        let v = odds((1.85, 1.95), Some((3.40, 3.42)), (4.20, 4.08))
            .variations()
            .unwrap();
        assert_eq!(v.shape(), Shape::ThreeWay);
        assert_eq!(hundredths(v.one), 10);
        assert_eq!(hundredths(v.x.unwrap()), 2);
        assert_eq!(hundredths(v.two), -12);
    }

    #[test]
    fn missing_draw_price_gives_two_way_shape() {
        let mut o = odds((1.50, 1.45), Some((3.0, 3.1)), (2.60, 2.70));
        o.x_final = None;
        let v = o.variations().unwrap();
        assert_eq!(v.shape(), Shape::TwoWay);
        assert!(v.x.is_none());
    }

    #[test]
    fn missing_home_price_is_an_error() {
        let mut o = odds((1.50, 1.45), None, (2.60, 2.70));
        o.one_final = None;
        assert_eq!(
            o.variations(),
            Err(VariationError::MissingPrice {
                choice: "1",
                stage: "final"
            })
        );
    }

    #[test]
    fn quantize_removes_float_noise() {
        let v = VariationVector::two_way(0.1 + 0.2, -0.3);
        assert_eq!(v.one, 0.3);
        assert_eq!(hundredths(0.14 - 0.10), 4);
    }

    #[test]
    fn display_formats() {
        let o = odds((1.85, 1.95), Some((3.40, 3.42)), (4.20, 4.08));
        assert_eq!(
            o.display().unwrap(),
            "1: 1.85→1.95, X: 3.40→3.42, 2: 4.20→4.08"
        );
        let v = o.variations().unwrap();
        assert_eq!(v.display(), "Δ1: 0.10, ΔX: 0.02, Δ2: -0.12");
        assert_eq!(VariationVector::two_way(0.05, -0.05).display(), "Δ1: 0.05, Δ2: -0.05");
    }

    #[test]
    fn differences_are_signed_offsets_from_the_query() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let c = VariationVector::three_way(0.13, 0.05, -0.16);
        assert_eq!(c.differences_from(&q), "Δ1: +0.03, ΔX: +0.03, Δ2: -0.04");

        let q = VariationVector::two_way(0.20, -0.30);
        assert_eq!(q.differences_from(&q), "Δ1: +0.00, Δ2: +0.00");
    }
}
