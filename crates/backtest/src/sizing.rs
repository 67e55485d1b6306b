//! Stake sizing under the configured mode and position cap.

use betlab_core::{KellyReason, KellySizer, RiskLimits, StakeMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sized stake with the reason it came out that way. A zero stake means
/// the candidate is not bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeDecision {
    pub stake: Decimal,
    pub reason: KellyReason,
}

impl StakeDecision {
    fn skip(reason: KellyReason) -> Self {
        Self {
            stake: Decimal::ZERO,
            reason,
        }
    }

    #[must_use]
    pub fn is_bet(&self) -> bool {
        self.stake > Decimal::ZERO
    }
}

#[derive(Debug, Clone)]
pub struct StakeSizer {
    mode: StakeMode,
    max_position_fraction: Decimal,
    kelly: KellySizer,
}

impl StakeSizer {
    #[must_use]
    pub fn new(mode: StakeMode, limits: &RiskLimits) -> Self {
        Self {
            mode,
            max_position_fraction: limits.max_position_fraction,
            kelly: KellySizer::half_kelly(limits.max_position_fraction),
        }
    }

    /// Sizes a bet.
    ///
    /// # Arguments
    /// * `win_probability` - Estimated probability that the chosen side wins
    /// * `decimal_odds` - Posted decimal odds for the chosen side
    /// * `bankroll` - Capital available before this bet
    #[must_use]
    pub fn size(&self, win_probability: f64, decimal_odds: Decimal, bankroll: Decimal) -> StakeDecision {
        if bankroll <= Decimal::ZERO {
            return StakeDecision::skip(KellyReason::InvalidInputs);
        }
        if decimal_odds <= Decimal::ONE {
            return StakeDecision::skip(KellyReason::DegenerateOdds);
        }

        match self.mode {
            StakeMode::Fixed { amount } => {
                let stake = amount.min(bankroll * self.max_position_fraction);
                if stake <= Decimal::ZERO {
                    return StakeDecision::skip(KellyReason::InvalidInputs);
                }
                StakeDecision {
                    stake,
                    reason: KellyReason::PositiveEdge,
                }
            }
            StakeMode::Kelly => {
                let Some(p) = probability_to_decimal(win_probability) else {
                    return StakeDecision::skip(KellyReason::InvalidInputs);
                };
                let decision = self.kelly.size(p, decimal_odds, bankroll);
                StakeDecision {
                    stake: decision.stake,
                    reason: decision.reason,
                }
            }
        }
    }
}

/// Converts a probability to `Decimal`, rounded to 8 places so float noise
/// from aggregation does not leak into stakes.
fn probability_to_decimal(p: f64) -> Option<Decimal> {
    if !p.is_finite() {
        return None;
    }
    Decimal::try_from(p).ok().map(|d| d.round_dp(8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits(max_position: Decimal) -> RiskLimits {
        RiskLimits {
            max_position_fraction: max_position,
            ..RiskLimits::default()
        }
    }

    #[test]
    fn fixed_stake_below_cap() {
        let sizer = StakeSizer::new(StakeMode::Fixed { amount: dec!(100) }, &limits(dec!(0.05)));
        let decision = sizer.size(0.6, dec!(1.91), dec!(10000));
        assert_eq!(decision.stake, dec!(100));
        assert!(decision.is_bet());
    }

    #[test]
    fn fixed_stake_capped_by_position_fraction() {
        let sizer = StakeSizer::new(StakeMode::Fixed { amount: dec!(1000) }, &limits(dec!(0.05)));
        let decision = sizer.size(0.6, dec!(1.91), dec!(10000));
        assert_eq!(decision.stake, dec!(500));
    }

    #[test]
    fn kelly_half_fraction() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.25)));
        let decision = sizer.size(0.6, dec!(2.0), dec!(10000));
        assert_eq!(decision.stake, dec!(1000));
        assert_eq!(decision.reason, KellyReason::PositiveEdge);
    }

    #[test]
    fn kelly_absorbs_float_noise() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.25)));
        let decision = sizer.size(0.6000000000000001, dec!(2.0), dec!(10000));
        assert_eq!(decision.stake, dec!(1000));
    }

    #[test]
    fn kelly_capped() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.05)));
        let decision = sizer.size(0.6, dec!(2.0), dec!(10000));
        assert_eq!(decision.stake, dec!(500));
    }

    #[test]
    fn kelly_no_edge_is_zero() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.25)));
        let decision = sizer.size(0.45, dec!(2.0), dec!(10000));
        assert_eq!(decision.stake, Decimal::ZERO);
        assert_eq!(decision.reason, KellyReason::NoEdge);
        assert!(!decision.is_bet());
    }

    #[test]
    fn degenerate_odds_are_zero_in_both_modes() {
        for mode in [StakeMode::Kelly, StakeMode::Fixed { amount: dec!(100) }] {
            let sizer = StakeSizer::new(mode, &limits(dec!(0.25)));
            let decision = sizer.size(0.9, dec!(1.0), dec!(10000));
            assert_eq!(decision.stake, Decimal::ZERO);
            assert_eq!(decision.reason, KellyReason::DegenerateOdds);
        }
    }

    #[test]
    fn nan_probability_is_invalid() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.25)));
        assert_eq!(
            sizer.size(f64::NAN, dec!(2.0), dec!(10000)).reason,
            KellyReason::InvalidInputs
        );
    }

    #[test]
    fn stake_never_exceeds_cap() {
        let sizer = StakeSizer::new(StakeMode::Kelly, &limits(dec!(0.1)));
        for p in [0.1, 0.5, 0.7, 0.95, 1.0] {
            for odds in [dec!(1.05), dec!(1.91), dec!(3.0), dec!(12.0)] {
                let stake = sizer.size(p, odds, dec!(7500)).stake;
                assert!(stake >= Decimal::ZERO);
                assert!(stake <= dec!(750), "p={p} odds={odds} stake={stake}");
            }
        }
    }
}
