//! Bankroll ledger: the single mutation point for capital during a run.

use std::collections::BTreeMap;

use betlab_core::{EngineError, SimulatedBet};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capital state owned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollState {
    pub initial: Decimal,
    pub current: Decimal,
    /// High-water mark; never decreases.
    pub peak: Decimal,
    /// `(peak - current) / peak`, in `[0, 1)`.
    pub drawdown: Decimal,
    pub daily_pnl: BTreeMap<NaiveDate, Decimal>,
}

impl BankrollState {
    #[must_use]
    pub fn new(initial: Decimal) -> Self {
        Self {
            initial,
            current: initial,
            peak: initial,
            drawdown: Decimal::ZERO,
            daily_pnl: BTreeMap::new(),
        }
    }
}

/// End-of-day capital snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub opening: Decimal,
    pub closing: Decimal,
    pub pnl: Decimal,
    pub peak: Decimal,
    pub drawdown: Decimal,
    pub bets: usize,
}

impl DailySnapshot {
    /// Return on the day's opening capital.
    #[must_use]
    pub fn daily_return(&self) -> f64 {
        if self.opening <= Decimal::ZERO {
            return 0.0;
        }
        f64::try_from(self.pnl / self.opening).unwrap_or(0.0)
    }
}

/// Append-only record of simulated bets plus the bankroll they produced.
#[derive(Debug)]
pub struct BankrollLedger {
    state: BankrollState,
    bets: Vec<SimulatedBet>,
    /// Capital after each applied bet, starting with the initial bankroll.
    equity_curve: Vec<Decimal>,
    snapshots: Vec<DailySnapshot>,
    day_opening: Decimal,
    day_bets: usize,
    closed: bool,
}

impl BankrollLedger {
    #[must_use]
    pub fn new(initial: Decimal) -> Self {
        Self {
            state: BankrollState::new(initial),
            bets: Vec::new(),
            equity_curve: vec![initial],
            snapshots: Vec::new(),
            day_opening: initial,
            day_bets: 0,
            closed: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &BankrollState {
        &self.state
    }

    #[must_use]
    pub fn current(&self) -> Decimal {
        self.state.current
    }

    #[must_use]
    pub fn bets(&self) -> &[SimulatedBet] {
        &self.bets
    }

    #[must_use]
    pub fn equity_curve(&self) -> &[Decimal] {
        &self.equity_curve
    }

    #[must_use]
    pub fn snapshots(&self) -> &[DailySnapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies a bet's P&L.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Invariant`] if the ledger is closed or the bet
    /// would drive capital negative. The ledger is left unchanged.
    pub fn apply(&mut self, bet: SimulatedBet) -> Result<&SimulatedBet, EngineError> {
        if self.closed {
            return Err(EngineError::Invariant(format!(
                "bet {} applied to a closed ledger",
                bet.id
            )));
        }
        let next = self.state.current + bet.pnl;
        if next < Decimal::ZERO {
            return Err(EngineError::Invariant(format!(
                "bet {} would drive capital to {next}",
                bet.id
            )));
        }

        self.state.current = next;
        if next > self.state.peak {
            self.state.peak = next;
        }
        self.state.drawdown = if self.state.peak > Decimal::ZERO {
            (self.state.peak - next) / self.state.peak
        } else {
            Decimal::ZERO
        };
        *self.state.daily_pnl.entry(bet.date).or_insert(Decimal::ZERO) += bet.pnl;

        tracing::debug!(
            "Applied bet {}: {} stake={} pnl={} bankroll={}",
            bet.id,
            bet.outcome,
            bet.stake,
            bet.pnl,
            next
        );

        self.equity_curve.push(next);
        self.day_bets += 1;
        self.bets.push(bet);
        let applied = self.bets.len() - 1;
        Ok(&self.bets[applied])
    }

    /// Closes the books for `date` and records its snapshot. Days without
    /// bets still get a snapshot with zero P&L.
    pub fn close_day(&mut self, date: NaiveDate) -> &DailySnapshot {
        let pnl = self.state.current - self.day_opening;
        self.state.daily_pnl.entry(date).or_insert(Decimal::ZERO);
        self.snapshots.push(DailySnapshot {
            date,
            opening: self.day_opening,
            closing: self.state.current,
            pnl,
            peak: self.state.peak,
            drawdown: self.state.drawdown,
            bets: self.day_bets,
        });
        self.day_opening = self.state.current;
        self.day_bets = 0;
        let last = self.snapshots.len() - 1;
        &self.snapshots[last]
    }

    /// Closes the ledger; later bets are rejected.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Daily returns over every closed day.
    #[must_use]
    pub fn daily_returns(&self) -> Vec<f64> {
        self.snapshots.iter().map(DailySnapshot::daily_return).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betlab_core::{BetOutcome, Candidate, MarketCandidate, PostedOdds, Side};
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn bet(day: u32, id: &str, stake: Decimal, pnl: Decimal) -> SimulatedBet {
        let outcome = if pnl > Decimal::ZERO {
            BetOutcome::Win
        } else if pnl < Decimal::ZERO {
            BetOutcome::Loss
        } else {
            BetOutcome::Push
        };
        let market = MarketCandidate {
            id: id.to_string(),
            date: date(day),
            event_id: "e".to_string(),
            player: "p".to_string(),
            prop_type: "points".to_string(),
            line: 20.5,
            odds: PostedOdds::even(dec!(2.0)),
            closing_odds: None,
            risk_score: None,
        };
        SimulatedBet {
            id: market.key(),
            timestamp: date(day).and_hms_opt(0, 0, 0).unwrap().and_utc(),
            date: date(day),
            candidate: Candidate {
                market,
                predictions: Vec::new(),
                consensus_prediction: 22.0,
                consensus_confidence: 0.6,
                side: Side::Over,
                implied_probability: 0.5,
                edge: 0.1,
                risk_score: 0.2,
                qualifies: true,
            },
            side: Side::Over,
            stake,
            odds: dec!(2.0),
            realized_value: 25.0,
            outcome,
            pnl,
        }
    }

    #[test]
    fn apply_updates_capital_and_peak() {
        let mut ledger = BankrollLedger::new(dec!(10000));
        ledger.apply(bet(1, "a", dec!(1000), dec!(1000))).unwrap();

        assert_eq!(ledger.current(), dec!(11000));
        assert_eq!(ledger.state().peak, dec!(11000));
        assert_eq!(ledger.state().drawdown, Decimal::ZERO);
        assert_eq!(ledger.state().daily_pnl[&date(1)], dec!(1000));
    }

    #[test]
    fn drawdown_from_peak() {
        let mut ledger = BankrollLedger::new(dec!(10000));
        ledger.apply(bet(1, "a", dec!(1000), dec!(1000))).unwrap();
        ledger.apply(bet(1, "b", dec!(2200), dec!(-2200))).unwrap();

        assert_eq!(ledger.current(), dec!(8800));
        assert_eq!(ledger.state().peak, dec!(11000));
        // (11000 - 8800) / 11000 = 0.2
        assert_eq!(ledger.state().drawdown, dec!(0.2));
        assert_eq!(ledger.state().daily_pnl[&date(1)], dec!(-1200));
    }

    #[test]
    fn peak_never_decreases() {
        let mut ledger = BankrollLedger::new(dec!(1000));
        let mut last_peak = ledger.state().peak;
        let pnls = [dec!(50), dec!(-30), dec!(-20), dec!(80), dec!(-45), dec!(10)];
        for (i, pnl) in pnls.into_iter().enumerate() {
            ledger
                .apply(bet(1, &format!("b{i}"), dec!(50), pnl))
                .unwrap();
            assert!(ledger.state().peak >= last_peak);
            assert!(ledger.state().drawdown >= Decimal::ZERO);
            assert!(ledger.state().drawdown < Decimal::ONE);
            last_peak = ledger.state().peak;
        }
        assert_eq!(ledger.equity_curve().len(), 7);
    }

    #[test]
    fn rejects_negative_capital() {
        let mut ledger = BankrollLedger::new(dec!(100));
        let err = ledger.apply(bet(1, "a", dec!(150), dec!(-150))).unwrap_err();

        assert!(matches!(err, EngineError::Invariant(_)));
        assert_eq!(ledger.current(), dec!(100));
        assert!(ledger.bets().is_empty());
    }

    #[test]
    fn rejects_bets_after_close() {
        let mut ledger = BankrollLedger::new(dec!(100));
        ledger.close();
        assert!(ledger.apply(bet(1, "a", dec!(10), dec!(10))).is_err());
        assert!(ledger.is_closed());
    }

    #[test]
    fn close_day_snapshots() {
        let mut ledger = BankrollLedger::new(dec!(1000));
        ledger.apply(bet(1, "a", dec!(100), dec!(100))).unwrap();
        ledger.apply(bet(1, "b", dec!(100), dec!(-100))).unwrap();
        ledger.apply(bet(1, "c", dec!(100), dec!(100))).unwrap();
        let first = ledger.close_day(date(1)).clone();

        assert_eq!(first.opening, dec!(1000));
        assert_eq!(first.closing, dec!(1100));
        assert_eq!(first.pnl, dec!(100));
        assert_eq!(first.bets, 3);
        assert!((first.daily_return() - 0.1).abs() < 1e-12);

        let quiet = ledger.close_day(date(2)).clone();
        assert_eq!(quiet.pnl, Decimal::ZERO);
        assert_eq!(quiet.bets, 0);
        assert_eq!(ledger.state().daily_pnl[&date(2)], Decimal::ZERO);

        assert_eq!(ledger.daily_returns(), vec![0.1, 0.0]);
    }
}
