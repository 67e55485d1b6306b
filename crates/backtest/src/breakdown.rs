//! Per-model, per-prop-type and per-day breakdowns of a run.

use std::collections::BTreeMap;

use betlab_core::{BetOutcome, Side, SimulatedBet};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::DailySnapshot;
use crate::metrics::mean;

/// How one model's calls fared on the bets that were placed.
///
/// A model "calls" over when its own value is at or above the line. Over is
/// the positive class for precision and recall. Pushes are not scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_id: String,
    /// Scored calls (bets placed on candidates this model predicted,
    /// excluding pushes).
    pub predictions: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Sum of bet P&L weighted by this model's share of the consensus.
    pub profit_contribution: Decimal,
}

#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    true_positive: usize,
    false_positive: usize,
    true_negative: usize,
    false_negative: usize,
}

impl Confusion {
    fn record(&mut self, called: Side, actual: Side) {
        match (called, actual) {
            (Side::Over, Side::Over) => self.true_positive += 1,
            (Side::Over, Side::Under) => self.false_positive += 1,
            (Side::Under, Side::Under) => self.true_negative += 1,
            (Side::Under, Side::Over) => self.false_negative += 1,
        }
    }

    fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    fn correct(&self) -> usize {
        self.true_positive + self.true_negative
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Scores every configured model. Models that contributed to no bet are
/// still listed, with zeros.
#[must_use]
pub fn model_performance(
    model_ids: &[String],
    bets: &[SimulatedBet],
) -> BTreeMap<String, ModelPerformance> {
    let mut confusion: BTreeMap<String, Confusion> = model_ids
        .iter()
        .map(|id| (id.clone(), Confusion::default()))
        .collect();
    let mut contribution: BTreeMap<String, Decimal> = model_ids
        .iter()
        .map(|id| (id.clone(), Decimal::ZERO))
        .collect();

    for bet in bets {
        let line = bet.candidate.market.line;
        let actual = if bet.realized_value > line {
            Some(Side::Over)
        } else if bet.realized_value < line {
            Some(Side::Under)
        } else {
            None
        };

        for prediction in &bet.candidate.predictions {
            let share = Decimal::try_from(prediction.weight_share)
                .map(|d| d.round_dp(8))
                .unwrap_or(Decimal::ZERO);
            *contribution
                .entry(prediction.model_id.clone())
                .or_insert(Decimal::ZERO) += bet.pnl * share;

            if let Some(actual) = actual {
                let called = Side::from_projection(prediction.value, line);
                confusion
                    .entry(prediction.model_id.clone())
                    .or_default()
                    .record(called, actual);
            }
        }
    }

    confusion
        .into_iter()
        .map(|(model_id, c)| {
            let precision = ratio(c.true_positive, c.true_positive + c.false_positive);
            let recall = ratio(c.true_positive, c.true_positive + c.false_negative);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            let profit_contribution = contribution
                .get(&model_id)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let performance = ModelPerformance {
                model_id: model_id.clone(),
                predictions: c.total(),
                correct: c.correct(),
                accuracy: ratio(c.correct(), c.total()),
                precision,
                recall,
                f1_score,
                profit_contribution,
            };
            (model_id, performance)
        })
        .collect()
}

/// Results for one prop type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropTypePerformance {
    pub prop_type: String,
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_staked: Decimal,
    pub net_pnl: Decimal,
    /// `net_pnl / total_staked`.
    pub roi: Decimal,
    pub average_edge: f64,
}

#[must_use]
pub fn prop_type_performance(bets: &[SimulatedBet]) -> BTreeMap<String, PropTypePerformance> {
    let mut grouped: BTreeMap<String, Vec<&SimulatedBet>> = BTreeMap::new();
    for bet in bets {
        grouped
            .entry(bet.candidate.market.prop_type.clone())
            .or_default()
            .push(bet);
    }

    grouped
        .into_iter()
        .map(|(prop_type, group)| {
            let wins = group.iter().filter(|b| b.outcome == BetOutcome::Win).count();
            let losses = group.iter().filter(|b| b.outcome == BetOutcome::Loss).count();
            let total_staked: Decimal = group.iter().map(|b| b.stake).sum();
            let net_pnl: Decimal = group.iter().map(|b| b.pnl).sum();
            let roi = if total_staked > Decimal::ZERO {
                net_pnl / total_staked
            } else {
                Decimal::ZERO
            };
            let edges: Vec<f64> = group.iter().map(|b| b.candidate.edge).collect();
            let performance = PropTypePerformance {
                prop_type: prop_type.clone(),
                total_bets: group.len(),
                wins,
                losses,
                win_rate: ratio(wins, wins + losses),
                total_staked,
                net_pnl,
                roi,
                average_edge: mean(&edges).unwrap_or(0.0),
            };
            (prop_type, performance)
        })
        .collect()
}

/// Bankroll state at the end of one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub bankroll: Decimal,
    pub daily_pnl: Decimal,
    pub drawdown: Decimal,
    pub bets: usize,
    /// Win rate over all bets up to and including this day.
    pub running_win_rate: f64,
}

#[must_use]
pub fn time_series(snapshots: &[DailySnapshot], bets: &[SimulatedBet]) -> Vec<TimeSeriesPoint> {
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut remaining = bets.iter().peekable();

    snapshots
        .iter()
        .map(|snapshot| {
            while let Some(bet) = remaining.next_if(|b| b.date <= snapshot.date) {
                match bet.outcome {
                    BetOutcome::Win => wins += 1,
                    BetOutcome::Loss => losses += 1,
                    BetOutcome::Push | BetOutcome::Pending => {}
                }
            }
            TimeSeriesPoint {
                date: snapshot.date,
                bankroll: snapshot.closing,
                daily_pnl: snapshot.pnl,
                drawdown: snapshot.drawdown,
                bets: snapshot.bets,
                running_win_rate: ratio(wins, wins + losses),
            }
        })
        .collect()
}
