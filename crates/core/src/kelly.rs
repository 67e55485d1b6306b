//! Kelly Criterion implementation for decimal-odds bet sizing.
//!
//! Provides fractional Kelly sizing with a hard cap on the fraction of
//! bankroll committed to a single bet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fractional Kelly bet sizer for decimal odds.
///
/// With net odds `b = odds - 1`, win probability `p` and `q = 1 - p`:
/// ```text
/// f* = (p*b - q) / b
/// f  = clamp(fraction * f*, 0, max_fraction)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellySizer {
    /// Fraction of Kelly to use (0.5 = half Kelly)
    pub fraction: Decimal,
    /// Upper bound on the fraction of bankroll staked
    pub max_fraction: Decimal,
}

impl Default for KellySizer {
    fn default() -> Self {
        Self {
            fraction: Decimal::new(5, 1), // 0.5 (half Kelly)
            max_fraction: Decimal::ONE,
        }
    }
}

/// Result of Kelly sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyDecision {
    /// Recommended stake amount
    pub stake: Decimal,
    /// Full Kelly fraction (before fractional scaling and clamping)
    pub full_kelly_fraction: Decimal,
    /// Fraction of bankroll actually staked
    pub applied_fraction: Decimal,
    /// Reason for the decision
    pub reason: KellyReason,
}

/// Reason for a Kelly sizing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KellyReason {
    /// Positive stake - edge found
    PositiveEdge,
    /// Zero stake - Kelly fraction is zero or negative
    NoEdge,
    /// Zero stake - odds at or below 1.0 pay nothing
    DegenerateOdds,
    /// Zero stake - probability or bankroll out of range
    InvalidInputs,
}

impl KellySizer {
    /// Half Kelly capped at `max_fraction` of bankroll.
    #[must_use]
    pub fn half_kelly(max_fraction: Decimal) -> Self {
        Self {
            max_fraction,
            ..Self::default()
        }
    }

    /// Calculates the stake using fractional Kelly.
    ///
    /// # Arguments
    /// * `win_prob` - Estimated probability of winning (0 to 1)
    /// * `decimal_odds` - Posted decimal odds for the side being bet
    /// * `bankroll` - Current bankroll to size the bet against
    ///
    /// # Examples
    /// ```
    /// use betlab_core::kelly::KellySizer;
    /// use rust_decimal_macros::dec;
    ///
    /// let sizer = KellySizer::half_kelly(dec!(0.25));
    /// let decision = sizer.size(dec!(0.6), dec!(2.0), dec!(10000));
    ///
    /// // f* = 0.2, half Kelly = 0.1
    /// assert_eq!(decision.stake, dec!(1000));
    /// ```
    #[must_use]
    pub fn size(&self, win_prob: Decimal, decimal_odds: Decimal, bankroll: Decimal) -> KellyDecision {
        if win_prob < Decimal::ZERO || win_prob > Decimal::ONE || bankroll <= Decimal::ZERO {
            return KellyDecision::zero(Decimal::ZERO, KellyReason::InvalidInputs);
        }

        let Some(full_kelly) = Self::full_kelly(win_prob, decimal_odds) else {
            return KellyDecision::zero(Decimal::ZERO, KellyReason::DegenerateOdds);
        };

        let applied = (full_kelly * self.fraction)
            .max(Decimal::ZERO)
            .min(self.max_fraction);

        if applied <= Decimal::ZERO {
            return KellyDecision::zero(full_kelly, KellyReason::NoEdge);
        }

        KellyDecision {
            stake: bankroll * applied,
            full_kelly_fraction: full_kelly,
            applied_fraction: applied,
            reason: KellyReason::PositiveEdge,
        }
    }

    /// Full Kelly fraction `(p*b - q) / b`, or `None` when `b <= 0`.
    #[must_use]
    pub fn full_kelly(win_prob: Decimal, decimal_odds: Decimal) -> Option<Decimal> {
        let b = decimal_odds - Decimal::ONE;
        if b <= Decimal::ZERO {
            return None;
        }
        let q = Decimal::ONE - win_prob;
        Some((win_prob * b - q) / b)
    }

}

impl KellyDecision {
    fn zero(full_kelly_fraction: Decimal, reason: KellyReason) -> Self {
        Self {
            stake: Decimal::ZERO,
            full_kelly_fraction,
            applied_fraction: Decimal::ZERO,
            reason,
        }
    }
}
