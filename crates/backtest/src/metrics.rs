//! Performance and risk metrics over any ordered sequence of bets.
//!
//! Works on simulated bets and live bet records alike through
//! [`SettledBet`]. Arithmetic edge cases (too few observations, zero
//! variance, no closing odds) never fail: the metric is reported as 0 and a
//! [`MetricFlag`] names the substitution.

use std::collections::{BTreeMap, BTreeSet};

use betlab_core::odds;
use betlab_core::{BetOutcome, SettledBet};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::BankrollLedger;

/// Default VaR confidence level.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;
/// Annual risk-free rate used for the Sharpe ratio.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
/// Trading periods per year used to de-annualize the risk-free rate and
/// annualize the Sharpe ratio.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// An arithmetic edge case that was replaced by a neutral 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFlag {
    /// No wins or losses; win rate is 0.
    NoResolvedBets,
    /// Fewer than two daily returns; Sharpe is 0.
    InsufficientReturns,
    /// Daily returns have zero variance; Sharpe is 0.
    ZeroVariance,
    /// No daily returns at all; VaR and expected shortfall are 0.
    NoReturns,
    /// Average win or average loss undefined; optimal Kelly is 0.
    UndefinedKelly,
    /// No bet carries closing odds; CLV-derived scores are 0.
    NoClosingOdds,
}

/// Capital path a report is computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSeries {
    pub initial: Decimal,
    pub final_capital: Decimal,
    pub daily_returns: Vec<f64>,
    /// Capital after each bet, starting with `initial`.
    pub equity_curve: Vec<Decimal>,
}

impl CapitalSeries {
    #[must_use]
    pub fn new(
        initial: Decimal,
        final_capital: Decimal,
        daily_returns: Vec<f64>,
        equity_curve: Vec<Decimal>,
    ) -> Self {
        Self {
            initial,
            final_capital,
            daily_returns,
            equity_curve,
        }
    }

    /// Capital path recorded by a backtest ledger. Every closed day
    /// contributes a return, including days without bets.
    #[must_use]
    pub fn from_ledger(ledger: &BankrollLedger) -> Self {
        Self {
            initial: ledger.state().initial,
            final_capital: ledger.current(),
            daily_returns: ledger.daily_returns(),
            equity_curve: ledger.equity_curve().to_vec(),
        }
    }

    /// Reconstructs a capital path from bets alone, grouping P&L by the day
    /// each bet settled. Pending bets are ignored.
    #[must_use]
    pub fn from_bets<B: SettledBet>(initial: Decimal, bets: &[B]) -> Self {
        let mut by_day: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
        for bet in bets.iter().filter(|b| b.outcome() != BetOutcome::Pending) {
            by_day.entry(bet.settled_on()).or_default().push(bet.pnl());
        }

        let mut capital = initial;
        let mut equity_curve = vec![initial];
        let mut daily_returns = Vec::with_capacity(by_day.len());
        for pnls in by_day.values() {
            let opening = capital;
            for pnl in pnls {
                capital += *pnl;
                equity_curve.push(capital);
            }
            let day_return = if opening > Decimal::ZERO {
                f64::try_from((capital - opening) / opening).unwrap_or(0.0)
            } else {
                0.0
            };
            daily_returns.push(day_return);
        }

        Self {
            initial,
            final_capital: capital,
            daily_returns,
            equity_curve,
        }
    }
}

/// Risk block of a [`PerformanceReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub sharpe_ratio: f64,
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub var_confidence: f64,
    /// Diagnostic Kelly fraction implied by realized results.
    pub optimal_kelly_fraction: f64,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: Decimal,
    pub max_consecutive_losses: u32,
    /// Population variance of per-bet P&L.
    pub pnl_variance: f64,
}

/// Full performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_bets: usize,
    /// Wins plus losses.
    pub resolved_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    pub pending: usize,
    pub win_rate: f64,
    pub total_staked: Decimal,
    pub net_pnl: Decimal,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub roi: Decimal,
    pub average_edge: f64,
    /// Mean closing line value in percent.
    pub average_clv: f64,
    pub clv_samples: usize,
    pub edge_retention: f64,
    pub market_efficiency_score: f64,
    pub sharpness_score: f64,
    pub risk: RiskMetrics,
    pub flags: BTreeSet<MetricFlag>,
}

impl PerformanceReport {
    #[must_use]
    pub fn has_flag(&self, flag: MetricFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Computes [`PerformanceReport`]s. Stateless apart from its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEngine {
    pub var_confidence: f64,
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            var_confidence: DEFAULT_VAR_CONFIDENCE,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: PERIODS_PER_YEAR,
        }
    }
}

impl MetricsEngine {
    #[must_use]
    pub fn with_var_confidence(mut self, confidence: f64) -> Self {
        self.var_confidence = confidence;
        self
    }

    /// Builds the full report for `bets` against `capital`.
    #[must_use]
    pub fn report<B: SettledBet>(&self, bets: &[B], capital: &CapitalSeries) -> PerformanceReport {
        let mut flags = BTreeSet::new();
        let mut neutral = |result: Result<f64, MetricFlag>| {
            result.unwrap_or_else(|flag| {
                flags.insert(flag);
                0.0
            })
        };

        let wins = count(bets, BetOutcome::Win);
        let losses = count(bets, BetOutcome::Loss);
        let pushes = count(bets, BetOutcome::Push);
        let pending = count(bets, BetOutcome::Pending);

        let win_rate = neutral(Self::win_rate(wins, losses));
        let sharpe_ratio = neutral(self.sharpe_ratio(&capital.daily_returns));
        let value_at_risk = neutral(self.value_at_risk(&capital.daily_returns));
        let expected_shortfall = neutral(self.expected_shortfall(&capital.daily_returns));
        let optimal_kelly_fraction = neutral(Self::optimal_kelly(bets));

        let clv_values: Vec<f64> = bets
            .iter()
            .filter_map(|b| {
                b.closing_odds()
                    .and_then(|closing| odds::closing_line_value(b.placed_odds(), closing))
            })
            .collect();
        let average_clv = neutral(mean(&clv_values).ok_or(MetricFlag::NoClosingOdds));
        let market_efficiency_score = neutral(Self::market_efficiency(&clv_values));
        let sharpness_score = 0.6 * average_clv + 0.4 * win_rate;
        let edge_retention = Self::average_edge_retention(bets);

        let total_staked: Decimal = bets.iter().map(SettledBet::stake).sum();
        let net_pnl: Decimal = bets.iter().map(SettledBet::pnl).sum();
        let roi = if capital.initial > Decimal::ZERO {
            (capital.final_capital - capital.initial) / capital.initial
        } else {
            Decimal::ZERO
        };
        let edges: Vec<f64> = bets.iter().map(SettledBet::edge).collect();

        PerformanceReport {
            total_bets: bets.len(),
            resolved_bets: wins + losses,
            wins,
            losses,
            pushes,
            pending,
            win_rate,
            total_staked,
            net_pnl,
            initial_capital: capital.initial,
            final_capital: capital.final_capital,
            roi,
            average_edge: mean(&edges).unwrap_or(0.0),
            average_clv,
            clv_samples: clv_values.len(),
            edge_retention,
            market_efficiency_score,
            sharpness_score,
            risk: RiskMetrics {
                sharpe_ratio,
                value_at_risk,
                expected_shortfall,
                var_confidence: self.var_confidence,
                optimal_kelly_fraction,
                max_drawdown: max_drawdown(&capital.equity_curve),
                max_consecutive_losses: max_consecutive_losses(bets),
                pnl_variance: pnl_variance(bets),
            },
            flags,
        }
    }

    /// Report over bets alone, reconstructing the capital path from their
    /// settlement days.
    #[must_use]
    pub fn report_from_bets<B: SettledBet>(&self, initial: Decimal, bets: &[B]) -> PerformanceReport {
        let capital = CapitalSeries::from_bets(initial, bets);
        self.report(bets, &capital)
    }

    /// `wins / (wins + losses)`.
    ///
    /// # Errors
    ///
    /// [`MetricFlag::NoResolvedBets`] when there are no wins or losses.
    pub fn win_rate(wins: usize, losses: usize) -> Result<f64, MetricFlag> {
        let resolved = wins + losses;
        if resolved == 0 {
            return Err(MetricFlag::NoResolvedBets);
        }
        Ok(wins as f64 / resolved as f64)
    }

    /// Annualized Sharpe ratio of daily returns, using the sample standard
    /// deviation:
    /// ```text
    /// (mean - rf / periods) / std * sqrt(periods)
    /// ```
    ///
    /// # Errors
    ///
    /// [`MetricFlag::InsufficientReturns`] below two observations,
    /// [`MetricFlag::ZeroVariance`] when all returns are equal.
    pub fn sharpe_ratio(&self, returns: &[f64]) -> Result<f64, MetricFlag> {
        if returns.len() < 2 {
            return Err(MetricFlag::InsufficientReturns);
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        if std_dev < 1e-12 {
            return Err(MetricFlag::ZeroVariance);
        }
        let excess = mean - self.risk_free_rate / self.periods_per_year;
        Ok(excess / std_dev * self.periods_per_year.sqrt())
    }

    /// Historical VaR at `var_confidence`, reported as a positive loss.
    ///
    /// # Errors
    ///
    /// [`MetricFlag::NoReturns`] for an empty series.
    pub fn value_at_risk(&self, returns: &[f64]) -> Result<f64, MetricFlag> {
        let (sorted, index) = self.tail_index(returns)?;
        Ok(-sorted[index])
    }

    /// Negated mean of the returns at or below the VaR cutoff.
    ///
    /// # Errors
    ///
    /// [`MetricFlag::NoReturns`] for an empty series.
    pub fn expected_shortfall(&self, returns: &[f64]) -> Result<f64, MetricFlag> {
        let (sorted, index) = self.tail_index(returns)?;
        let cutoff = sorted[index];
        let tail: Vec<f64> = sorted.into_iter().filter(|r| *r <= cutoff).collect();
        Ok(-mean(&tail).unwrap_or(0.0))
    }

    /// Sorted returns and the VaR index `floor((1 - c) * n)`, clamped to
    /// `n - 1`.
    fn tail_index(&self, returns: &[f64]) -> Result<(Vec<f64>, usize), MetricFlag> {
        if returns.is_empty() {
            return Err(MetricFlag::NoReturns);
        }
        let mut sorted = returns.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        // Nudge before flooring so (1 - 0.9) * 10 lands on 1, not 0.
        let raw = ((1.0 - self.var_confidence) * n as f64 + 1e-9).floor();
        let index = if raw.is_finite() && raw > 0.0 {
            (raw as usize).min(n - 1)
        } else {
            0
        };
        Ok((sorted, index))
    }

    /// Diagnostic optimal Kelly fraction from realized results:
    /// `win_rate / avg_loss - (1 - win_rate) / avg_win`, where the averages
    /// are mean absolute P&L of winning and losing bets.
    ///
    /// # Errors
    ///
    /// [`MetricFlag::UndefinedKelly`] without at least one win and one loss
    /// of non-zero size.
    pub fn optimal_kelly<B: SettledBet>(bets: &[B]) -> Result<f64, MetricFlag> {
        let wins: Vec<f64> = abs_pnls(bets, BetOutcome::Win);
        let losses: Vec<f64> = abs_pnls(bets, BetOutcome::Loss);
        let (Some(avg_win), Some(avg_loss)) = (mean(&wins), mean(&losses)) else {
            return Err(MetricFlag::UndefinedKelly);
        };
        if avg_win <= 0.0 || avg_loss <= 0.0 {
            return Err(MetricFlag::UndefinedKelly);
        }
        let win_rate = wins.len() as f64 / (wins.len() + losses.len()) as f64;
        Ok(win_rate / avg_loss - (1.0 - win_rate) / avg_win)
    }

    /// `max(0, 100 - 10 * mean(|clv|))`. Heuristic only.
    ///
    /// # Errors
    ///
    /// [`MetricFlag::NoClosingOdds`] without CLV samples.
    pub fn market_efficiency(clv_values: &[f64]) -> Result<f64, MetricFlag> {
        let absolute: Vec<f64> = clv_values.iter().map(|c| c.abs()).collect();
        let mean_abs = mean(&absolute).ok_or(MetricFlag::NoClosingOdds)?;
        Ok((100.0 - 10.0 * mean_abs).max(0.0))
    }

    /// Mean edge retention over bets with closing odds, skipping bets whose
    /// retention is 0.
    fn average_edge_retention<B: SettledBet>(bets: &[B]) -> f64 {
        let retained: Vec<f64> = bets
            .iter()
            .filter_map(|b| {
                b.closing_odds()
                    .map(|closing| odds::edge_retention(b.placed_odds(), closing).unwrap_or(0.0))
            })
            .filter(|r| *r != 0.0)
            .collect();
        mean(&retained).unwrap_or(0.0)
    }
}

/// Largest peak-to-trough decline of an equity curve, as a fraction of the
/// peak.
#[must_use]
pub fn max_drawdown(equity_curve: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - equity) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    max_dd
}

/// Longest run of losses. Any other outcome ends a streak.
#[must_use]
pub fn max_consecutive_losses<B: SettledBet>(bets: &[B]) -> u32 {
    let mut current_streak = 0u32;
    let mut max_streak = 0u32;

    for bet in bets {
        if bet.outcome() == BetOutcome::Loss {
            current_streak += 1;
            max_streak = max_streak.max(current_streak);
        } else {
            current_streak = 0;
        }
    }

    max_streak
}

/// Population variance of per-bet P&L over settled bets.
#[must_use]
pub fn pnl_variance<B: SettledBet>(bets: &[B]) -> f64 {
    let pnls: Vec<f64> = bets
        .iter()
        .filter(|b| b.outcome() != BetOutcome::Pending)
        .map(|b| f64::try_from(b.pnl()).unwrap_or(0.0))
        .collect();
    let Some(mean) = mean(&pnls) else {
        return 0.0;
    };
    pnls.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pnls.len() as f64
}

fn count<B: SettledBet>(bets: &[B], outcome: BetOutcome) -> usize {
    bets.iter().filter(|b| b.outcome() == outcome).count()
}

fn abs_pnls<B: SettledBet>(bets: &[B], outcome: BetOutcome) -> Vec<f64> {
    bets.iter()
        .filter(|b| b.outcome() == outcome)
        .map(|b| f64::try_from(b.pnl().abs()).unwrap_or(0.0))
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
