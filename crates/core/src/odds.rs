//! Odds conversions and price-derived measures.
//!
//! Every edge, CLV, and edge-retention figure in the workspace is computed from
//! [`implied_probability`], so numbers produced by different components stay
//! comparable. American prices are converted to decimal before conversion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price as quoted by a sportsbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "price", rename_all = "snake_case")]
pub enum Odds {
    /// Decimal odds (total return per unit staked, e.g. 1.91).
    Decimal(Decimal),
    /// American odds (e.g. -110, +150).
    American(i32),
}

impl Odds {
    /// Returns the price in decimal form.
    ///
    /// An American price of 0 is not a valid quote and maps to zero.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        match self {
            Self::Decimal(price) => price,
            Self::American(price) => american_to_decimal(price),
        }
    }

    /// Implied probability of this price. See [`implied_probability`].
    #[must_use]
    pub fn implied_probability(self) -> Option<f64> {
        implied_probability(self.to_decimal())
    }
}

/// Converts an American price to decimal odds.
///
/// ```
/// use betlab_core::odds::american_to_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(american_to_decimal(150), dec!(2.5));
/// assert_eq!(american_to_decimal(-200), dec!(1.5));
/// ```
#[must_use]
pub fn american_to_decimal(american: i32) -> Decimal {
    let price = Decimal::from(american);
    if american > 0 {
        price / Decimal::ONE_HUNDRED + Decimal::ONE
    } else if american < 0 {
        Decimal::ONE_HUNDRED / price.abs() + Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

/// The canonical odds-to-probability conversion: `1 / decimal_odds`.
///
/// Returns `None` for prices at or below 1.0, which carry no payout and
/// therefore no meaningful implied probability.
#[must_use]
pub fn implied_probability(decimal_odds: Decimal) -> Option<f64> {
    if decimal_odds <= Decimal::ONE {
        return None;
    }
    f64::try_from(Decimal::ONE / decimal_odds).ok()
}

/// Theoretical edge of a price: `max(0, 1 - implied probability)`.
#[must_use]
pub fn theoretical_edge(decimal_odds: Decimal) -> f64 {
    implied_probability(decimal_odds).map_or(0.0, |p| (1.0 - p).max(0.0))
}

/// Closing line value in percent.
///
/// `((placed_implied - closing_implied) / placed_implied) * 100`. Positive when
/// the closing price implies a lower probability than the placed price, i.e.
/// the bettor beat the market's final number.
#[must_use]
pub fn closing_line_value(placed: Decimal, closing: Decimal) -> Option<f64> {
    let placed_prob = implied_probability(placed)?;
    let closing_prob = implied_probability(closing)?;
    if placed_prob <= 0.0 {
        return None;
    }
    Some((placed_prob - closing_prob) / placed_prob * 100.0)
}

/// Percentage of the placed price's theoretical edge still present at close.
///
/// `None` when the closing price has no theoretical edge.
#[must_use]
pub fn edge_retention(placed: Decimal, closing: Decimal) -> Option<f64> {
    let closing_edge = theoretical_edge(closing);
    if closing_edge <= 0.0 {
        return None;
    }
    Some(theoretical_edge(placed) / closing_edge * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn american_positive_price() {
        assert_eq!(american_to_decimal(100), dec!(2));
        assert_eq!(american_to_decimal(250), dec!(3.5));
    }

    #[test]
    fn american_negative_price() {
        assert_eq!(american_to_decimal(-100), dec!(2));
        assert_eq!(american_to_decimal(-400), dec!(1.25));
    }

    #[test]
    fn american_zero_is_invalid() {
        assert_eq!(american_to_decimal(0), Decimal::ZERO);
        assert_eq!(Odds::American(0).implied_probability(), None);
    }

    #[test]
    fn implied_probability_of_even_money() {
        let p = implied_probability(dec!(2.0)).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn implied_probability_rejects_degenerate_prices() {
        assert_eq!(implied_probability(dec!(1.0)), None);
        assert_eq!(implied_probability(dec!(0.5)), None);
        assert_eq!(implied_probability(Decimal::ZERO), None);
    }

    #[test]
    fn american_and_decimal_agree() {
        let american = Odds::American(-110).implied_probability().unwrap();
        let decimal = implied_probability(american_to_decimal(-110)).unwrap();
        assert!((american - decimal).abs() < 1e-12);
        assert!((american - 110.0 / 210.0).abs() < 1e-9);
    }

    #[test]
    fn clv_negative_when_closing_implies_higher_probability() {
        // placed implied = 0.4545, closing implied = 0.5
        let clv = closing_line_value(dec!(2.20), dec!(2.00)).unwrap();
        assert!(clv < 0.0, "clv was {clv}");
    }

    #[test]
    fn clv_positive_when_closing_implies_lower_probability() {
        // placed implied = 0.5, closing implied = 0.4545
        let clv = closing_line_value(dec!(2.00), dec!(2.20)).unwrap();
        assert!(clv > 0.0);
        assert!((clv - 9.0909).abs() < 0.001, "clv was {clv}");
    }

    #[test]
    fn clv_zero_when_price_unchanged() {
        let clv = closing_line_value(dec!(1.91), dec!(1.91)).unwrap();
        assert!(clv.abs() < 1e-12);
    }

    #[test]
    fn clv_undefined_for_degenerate_prices() {
        assert_eq!(closing_line_value(dec!(1.0), dec!(2.0)), None);
        assert_eq!(closing_line_value(dec!(2.0), dec!(0.9)), None);
    }

    #[test]
    fn theoretical_edge_matches_complement_of_implied() {
        assert!((theoretical_edge(dec!(4.0)) - 0.75).abs() < 1e-12);
        assert!(theoretical_edge(dec!(1.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn edge_retention_full_when_unchanged() {
        let retained = edge_retention(dec!(2.5), dec!(2.5)).unwrap();
        assert!((retained - 100.0).abs() < 1e-9);
    }

    #[test]
    fn edge_retention_undefined_without_closing_edge() {
        assert_eq!(edge_retention(dec!(2.0), dec!(1.0)), None);
    }

    #[test]
    fn odds_serde_tagged_format() {
        let json = serde_json::to_string(&Odds::American(-110)).unwrap();
        assert_eq!(json, r#"{"format":"american","price":-110}"#);
        let back: Odds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Odds::American(-110));
    }
}
