//! Bet settlement against realized outcomes.

use betlab_core::{BetOutcome, Candidate, Side, SimulatedBet};
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

pub struct BetSimulator;

impl BetSimulator {
    /// Settles a bet on `candidate` at its posted odds.
    ///
    /// The bet is timestamped at midnight UTC of the candidate's date so that
    /// replays produce identical records.
    #[must_use]
    pub fn simulate(candidate: &Candidate, stake: Decimal, realized_value: f64) -> SimulatedBet {
        let side = candidate.side;
        let odds = candidate.posted_odds();
        let outcome = Self::determine_outcome(side, candidate.market.line, realized_value);
        let pnl = outcome.pnl(stake, odds);
        let date = candidate.market.date;

        SimulatedBet {
            id: candidate.market.key(),
            timestamp: Self::timestamp_for(date),
            date,
            candidate: candidate.clone(),
            side,
            stake,
            odds,
            realized_value,
            outcome,
            pnl,
        }
    }

    /// Settlement logic:
    /// - over wins if realized > line
    /// - under wins if realized < line
    /// - realized == line is a push
    #[must_use]
    pub fn determine_outcome(side: Side, line: f64, realized_value: f64) -> BetOutcome {
        if realized_value == line {
            return BetOutcome::Push;
        }
        let over_hit = realized_value > line;
        match (side, over_hit) {
            (Side::Over, true) | (Side::Under, false) => BetOutcome::Win,
            _ => BetOutcome::Loss,
        }
    }

    fn timestamp_for(date: chrono::NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc()
    }
}
