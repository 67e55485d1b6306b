//! Day-by-day backtest loop.
//!
//! Each day the engine fetches the slate, evaluates every candidate against
//! the configured models on a bounded worker pool, qualifies and sizes the
//! survivors, and settles them into the ledger in candidate-id order. The
//! risk governor is consulted after every bet and again at the day boundary.
//!
//! # Example
//!
//! ```ignore
//! let engine = BacktestEngine::new(config, Arc::new(provider), registry)
//!     .with_cancellation(cancel_rx);
//! let result = engine.run().await?;
//! println!("{}", result.to_json()?);
//! ```

use std::sync::Arc;

use betlab_core::{
    Candidate, ConfigurationError, DataGapError, EngineError, HistoricalDataProvider,
    LineupSelector, MarketCandidate, ModelRegistry, PredictionModel, RunConfig,
};
use chrono::NaiveDate;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::aggregator::{PredictionAggregator, RawPrediction};
use crate::breakdown;
use crate::governor::{HaltReason, RiskGovernor};
use crate::ledger::BankrollLedger;
use crate::lineup::LineupStrategy;
use crate::metrics::{CapitalSeries, MetricsEngine};
use crate::qualification::QualificationFilter;
use crate::result::{RunResult, SkippedDay};
use crate::simulator::BetSimulator;
use crate::sizing::StakeSizer;
use crate::state::RunState;

type Models = Arc<[Arc<dyn PredictionModel>]>;

/// Runs one backtest over a [`RunConfig`].
pub struct BacktestEngine {
    config: RunConfig,
    provider: Arc<dyn HistoricalDataProvider>,
    registry: ModelRegistry,
    selector: Option<Arc<dyn LineupSelector>>,
    cancel: Option<watch::Receiver<bool>>,
    metrics: MetricsEngine,
}

/// How the day loop ended. A halt is carried by the run state.
struct DayLoop {
    skipped_days: Vec<SkippedDay>,
    days_simulated: usize,
    cancelled: bool,
}

impl BacktestEngine {
    /// Creates an engine.
    ///
    /// # Arguments
    /// * `config` - Run configuration, validated when the run starts
    /// * `provider` - Source of daily slates and realized outcomes
    /// * `registry` - Models the configuration's ids are resolved against
    #[must_use]
    pub fn new(
        config: RunConfig,
        provider: Arc<dyn HistoricalDataProvider>,
        registry: ModelRegistry,
    ) -> Self {
        Self {
            config,
            provider,
            registry,
            selector: None,
            cancel: None,
            metrics: MetricsEngine::default(),
        }
    }

    /// Overrides the lineup selector named by `config.lineup_strategy`.
    #[must_use]
    pub fn with_lineup_selector(mut self, selector: Arc<dyn LineupSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Stops the run at the next day boundary once the flag turns `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsEngine) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the backtest to completion, halt or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an invalid config, an
    /// unregistered model, an unknown lineup strategy or a zero-weight
    /// aggregation. Returns [`EngineError::Invariant`] if the ledger rejects a
    /// bet. Halts and data gaps are not errors; they are reported on the
    /// result.
    pub async fn run(&self) -> Result<RunResult, EngineError> {
        self.config.validate()?;
        let models: Models = self.registry.resolve(&self.config.models)?.into();
        if models.iter().all(|m| m.historical_accuracy() <= 0.0) {
            return Err(ConfigurationError::ZeroWeight {
                context: format!("models [{}]", self.config.models.join(", ")),
            }
            .into());
        }
        let selector = self.resolve_selector()?;

        let mut state = RunState::Initialized.transition(RunState::Running)?;
        tracing::info!(
            "Starting backtest {} to {} with {} model(s), bankroll {}",
            self.config.start_date,
            self.config.end_date,
            models.len(),
            self.config.initial_bankroll
        );

        let mut ledger = BankrollLedger::new(self.config.initial_bankroll);
        let outcome = self
            .run_days(&mut state, &models, selector.as_deref(), &mut ledger)
            .await?;

        if state.accepts_bets() {
            state = state.transition(RunState::Completed)?;
        }
        let termination = state;
        ledger.close();

        let capital = CapitalSeries::from_ledger(&ledger);
        let summary = self.metrics.report(ledger.bets(), &capital);
        let result = RunResult {
            termination,
            cancelled: outcome.cancelled,
            config: self.config.clone(),
            summary,
            model_performance: breakdown::model_performance(&self.config.models, ledger.bets()),
            prop_type_performance: breakdown::prop_type_performance(ledger.bets()),
            time_series: breakdown::time_series(ledger.snapshots(), ledger.bets()),
            bets: ledger.bets().to_vec(),
            days_simulated: outcome.days_simulated,
            skipped_days: outcome.skipped_days,
        };
        state = state.transition(RunState::ResultComputed)?;

        tracing::info!(
            "Backtest {}: {} bets, net P&L {}, ROI {}, {} day(s) skipped",
            state,
            result.summary.total_bets,
            result.summary.net_pnl,
            result.summary.roi,
            result.skipped_days.len()
        );
        Ok(result)
    }

    fn resolve_selector(&self) -> Result<Option<Arc<dyn LineupSelector>>, ConfigurationError> {
        if self.config.target_legs <= 1 {
            return Ok(None);
        }
        if let Some(selector) = &self.selector {
            return Ok(Some(Arc::clone(selector)));
        }
        let strategy = LineupStrategy::from_name(&self.config.lineup_strategy)?;
        Ok(Some(Arc::new(strategy)))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn run_days(
        &self,
        state: &mut RunState,
        models: &Models,
        selector: Option<&dyn LineupSelector>,
        ledger: &mut BankrollLedger,
    ) -> Result<DayLoop, EngineError> {
        let filter = QualificationFilter::from_config(&self.config);
        let sizer = StakeSizer::new(self.config.stake, &self.config.risk);
        let governor = RiskGovernor::new(&self.config.risk);
        let mut outcome = DayLoop {
            skipped_days: Vec::new(),
            days_simulated: 0,
            cancelled: false,
        };

        for date in self.config.dates() {
            if self.is_cancelled() {
                tracing::info!("Backtest cancelled before {}", date);
                outcome.cancelled = true;
                break;
            }

            let slate = match self.fetch_slate(date).await {
                Ok(slate) => slate,
                Err(gap) => {
                    tracing::warn!("Skipping day: {}", gap);
                    outcome.skipped_days.push(SkippedDay {
                        date: gap.date,
                        reason: gap.reason,
                    });
                    continue;
                }
            };
            outcome.days_simulated += 1;

            let markets: Vec<MarketCandidate> = slate
                .into_iter()
                .filter(|m| filter.accepts_prop_type(m))
                .collect();
            let evaluated = self.evaluate(markets, models).await?;
            let qualified: Vec<Candidate> = evaluated
                .into_iter()
                .map(|c| filter.apply(c))
                .filter(|c| c.qualifies)
                .collect();
            let picks = self.pick(date, qualified, selector);
            tracing::debug!("{}: {} pick(s)", date, picks.len());

            for candidate in picks {
                if !state.accepts_bets() {
                    break;
                }
                let decision = sizer.size(
                    candidate.win_probability(),
                    candidate.posted_odds(),
                    ledger.current(),
                );
                if !decision.is_bet() {
                    tracing::debug!("No stake on {} ({:?})", candidate.market.key(), decision.reason);
                    continue;
                }

                let realized = match self.provider.outcome(&candidate.market).await {
                    Ok(Some(value)) if value.is_finite() => value,
                    Ok(_) => {
                        tracing::debug!("No outcome for {}; not betting", candidate.market.key());
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!("Outcome lookup failed for {}: {:#}", candidate.market.key(), err);
                        continue;
                    }
                };

                let bet = BetSimulator::simulate(&candidate, decision.stake, realized);
                ledger.apply(bet)?;

                if let Some(reason) = governor.check(ledger.state()) {
                    *state = halt(*state, reason, ledger)?;
                }
            }

            ledger.close_day(date);
            if state.accepts_bets() {
                if let Some(reason) = governor.check(ledger.state()) {
                    *state = halt(*state, reason, ledger)?;
                }
            }
            if !state.accepts_bets() {
                break;
            }
        }

        Ok(outcome)
    }

    async fn fetch_slate(&self, date: NaiveDate) -> Result<Vec<MarketCandidate>, DataGapError> {
        match self.provider.slate(date).await {
            Ok(Some(slate)) => Ok(slate),
            Ok(None) => Err(DataGapError {
                date,
                reason: "no slate".to_string(),
            }),
            Err(err) => Err(DataGapError {
                date,
                reason: format!("{err:#}"),
            }),
        }
    }

    /// Evaluates a day's markets on a worker pool of `worker_count` permits.
    /// The result is ordered by candidate id regardless of completion order.
    async fn evaluate(
        &self,
        markets: Vec<MarketCandidate>,
        models: &Models,
    ) -> Result<Vec<Candidate>, ConfigurationError> {
        let permits = Arc::new(Semaphore::new(self.config.worker_count));
        let mut tasks = JoinSet::new();

        for market in markets {
            let models = Arc::clone(models);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Ok(None);
                };
                evaluate_candidate(market, &models).await
            });
        }

        let mut candidates = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(candidate))) => candidates.push(candidate),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => return Err(err),
                Err(err) => tracing::warn!("Candidate evaluation task failed: {}", err),
            }
        }

        candidates.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(candidates)
    }

    fn pick(
        &self,
        date: NaiveDate,
        qualified: Vec<Candidate>,
        selector: Option<&dyn LineupSelector>,
    ) -> Vec<Candidate> {
        let Some(selector) = selector else {
            return qualified;
        };
        let target_legs = self.config.target_legs;
        match selector.select(qualified, target_legs) {
            Ok(picks) if picks.len() < target_legs => {
                tracing::debug!(
                    "Lineup selector {} found {} of {} leg(s) on {}; no lineup",
                    selector.name(),
                    picks.len(),
                    target_legs,
                    date
                );
                Vec::new()
            }
            Ok(mut picks) => {
                picks.truncate(target_legs);
                picks.sort_by(|a, b| a.id().cmp(b.id()));
                picks
            }
            Err(err) => {
                tracing::warn!("Lineup selector {} failed on {}: {:#}", selector.name(), date, err);
                Vec::new()
            }
        }
    }
}

fn halt(state: RunState, reason: HaltReason, ledger: &BankrollLedger) -> Result<RunState, EngineError> {
    tracing::warn!(
        "Backtest halted ({:?}) with bankroll {} and drawdown {}",
        reason,
        ledger.current(),
        ledger.state().drawdown
    );
    state.transition(reason.terminal_state())
}

/// Collects every model's prediction for `market` and aggregates them.
/// A failing model drops the candidate.
async fn evaluate_candidate(
    market: MarketCandidate,
    models: &[Arc<dyn PredictionModel>],
) -> Result<Option<Candidate>, ConfigurationError> {
    let mut predictions = Vec::with_capacity(models.len());
    for model in models {
        match model.predict(&market).await {
            Ok(output) => predictions.push(RawPrediction::new(
                model.id(),
                output,
                model.historical_accuracy(),
            )),
            Err(err) => {
                tracing::warn!("Model {} failed on {}: {:#}", model.id(), market.key(), err);
                return Ok(None);
            }
        }
    }
    PredictionAggregator::aggregate(market, predictions).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use betlab_core::{ModelOutput, PostedOdds, RiskLimits, StakeMode};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::data_provider::InMemoryProvider;

    struct ConstantModel {
        id: &'static str,
        accuracy: f64,
        output: ModelOutput,
    }

    #[async_trait]
    impl PredictionModel for ConstantModel {
        fn id(&self) -> &str {
            self.id
        }

        fn historical_accuracy(&self) -> f64 {
            self.accuracy
        }

        async fn predict(&self, market: &MarketCandidate) -> anyhow::Result<ModelOutput> {
            if market.player == "broken" {
                return Err(anyhow!("no features for {}", market.player));
            }
            Ok(self.output)
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn market(day: u32, id: &str, player: &str) -> MarketCandidate {
        MarketCandidate {
            id: id.to_string(),
            date: date(day),
            event_id: format!("game-{id}"),
            player: player.to_string(),
            prop_type: "points".to_string(),
            line: 20.5,
            odds: PostedOdds::even(dec!(2.0)),
            closing_odds: None,
            risk_score: Some(0.1),
        }
    }

    fn registry(accuracy: f64, confidence: f64) -> ModelRegistry {
        ModelRegistry::new().with_model(Arc::new(ConstantModel {
            id: "m",
            accuracy,
            output: ModelOutput {
                value: 25.0,
                confidence,
            },
        }))
    }

    fn config(days: u32) -> RunConfig {
        RunConfig::new(date(1), date(days), vec!["m".to_string()], dec!(1000))
            .with_stake(StakeMode::Fixed { amount: dec!(10) })
    }

    #[tokio::test]
    async fn places_one_bet_per_qualified_candidate() {
        let provider = InMemoryProvider::new()
            .with_candidate(market(1, "b", "bob"), Some(30.0))
            .with_candidate(market(1, "a", "ann"), Some(10.0));
        let engine = BacktestEngine::new(config(1), Arc::new(provider), registry(1.0, 0.6));

        let result = engine.run().await.unwrap();

        assert_eq!(result.termination, RunState::Completed);
        let ids: Vec<&str> = result.bets.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2024-01-01:a", "2024-01-01:b"]);
        assert_eq!(result.summary.wins, 1);
        assert_eq!(result.summary.losses, 1);
        assert_eq!(result.summary.net_pnl, Decimal::ZERO);
    }

    #[tokio::test]
    async fn failing_model_drops_only_that_candidate() {
        let provider = InMemoryProvider::new()
            .with_candidate(market(1, "a", "broken"), Some(30.0))
            .with_candidate(market(1, "b", "bob"), Some(30.0));
        let engine = BacktestEngine::new(config(1), Arc::new(provider), registry(1.0, 0.6));

        let result = engine.run().await.unwrap();
        assert_eq!(result.bets.len(), 1);
        assert_eq!(result.bets[0].candidate.id(), "b");
    }

    #[tokio::test]
    async fn unresolved_outcome_is_not_bet() {
        let provider = InMemoryProvider::new().with_candidate(market(1, "a", "ann"), None);
        let engine = BacktestEngine::new(config(1), Arc::new(provider), registry(1.0, 0.6));

        let result = engine.run().await.unwrap();
        assert!(result.bets.is_empty());
        assert_eq!(result.days_simulated, 1);
    }

    #[tokio::test]
    async fn zero_accuracy_models_abort() {
        let provider = InMemoryProvider::new().with_candidate(market(1, "a", "ann"), Some(30.0));
        let engine = BacktestEngine::new(config(1), Arc::new(provider), registry(0.0, 0.6));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigurationError::ZeroWeight { .. })
        ));
    }

    #[tokio::test]
    async fn zero_confidence_aggregation_aborts() {
        let provider = InMemoryProvider::new().with_candidate(market(1, "a", "ann"), Some(30.0));
        let engine = BacktestEngine::new(config(1), Arc::new(provider), registry(1.0, 0.0));

        let err = engine.run().await.unwrap_err();
        assert!(err.to_string().contains("2024-01-01:a"));
    }

    #[tokio::test]
    async fn unknown_lineup_strategy_aborts() {
        let engine = BacktestEngine::new(
            config(1).with_target_legs(2, "kmeans"),
            Arc::new(InMemoryProvider::new()),
            registry(1.0, 0.6),
        );
        let err = engine.run().await.unwrap_err();
        assert!(err.to_string().contains("kmeans"));
    }

    #[tokio::test]
    async fn single_worker_pool_matches_wide_pool() {
        let provider = (0..12).fold(InMemoryProvider::new(), |p, i| {
            p.with_candidate(market(1, &format!("c{i:02}"), "p"), Some(if i % 3 == 0 { 10.0 } else { 30.0 }))
        });
        let provider: Arc<dyn HistoricalDataProvider> = Arc::new(provider);

        let narrow = BacktestEngine::new(config(1).with_worker_count(1), Arc::clone(&provider), registry(1.0, 0.6))
            .run()
            .await
            .unwrap();
        let wide = BacktestEngine::new(config(1).with_worker_count(8), provider, registry(1.0, 0.6))
            .run()
            .await
            .unwrap();

        assert_eq!(narrow.bets, wide.bets);
        assert_eq!(narrow.summary, wide.summary);
    }

    #[tokio::test]
    async fn halted_run_stops_betting() {
        let provider = (1..=5).fold(InMemoryProvider::new(), |p, d| {
            p.with_candidate(market(d, "a", "ann"), Some(10.0))
        });
        let limits = RiskLimits {
            max_position_fraction: dec!(0.2),
            stop_loss_fraction: dec!(0.3),
            max_drawdown_fraction: dec!(0.9),
        };
        let engine = BacktestEngine::new(
            config(5)
                .with_stake(StakeMode::Fixed { amount: dec!(200) })
                .with_risk_limits(limits),
            Arc::new(provider),
            registry(1.0, 0.6),
        );

        let result = engine.run().await.unwrap();
        assert_eq!(result.termination, RunState::HaltedStopLoss);
        // 1000 -> 800 -> 640: at or below the 700 floor after two losses.
        assert_eq!(result.bets.len(), 2);
        assert_eq!(result.summary.final_capital, dec!(640));
        assert_eq!(result.time_series.len(), 2);
    }

    #[tokio::test]
    async fn halt_mid_day_skips_remaining_picks() {
        let provider = ["a", "b", "c"].into_iter().fold(InMemoryProvider::new(), |p, id| {
            p.with_candidate(market(1, id, "ann"), Some(10.0))
        });
        let limits = RiskLimits {
            max_position_fraction: dec!(0.2),
            stop_loss_fraction: dec!(0.3),
            max_drawdown_fraction: dec!(0.9),
        };
        let engine = BacktestEngine::new(
            config(1)
                .with_stake(StakeMode::Fixed { amount: dec!(200) })
                .with_risk_limits(limits),
            Arc::new(provider),
            registry(1.0, 0.6),
        );

        let result = engine.run().await.unwrap();
        assert_eq!(result.termination, RunState::HaltedStopLoss);
        let ids: Vec<&str> = result.bets.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2024-01-01:a", "2024-01-01:b"]);
        assert_eq!(result.time_series.len(), 1);
    }

    /// Returns the first `legs` candidates regardless of the target.
    struct FirstLegs {
        legs: usize,
    }

    impl LineupSelector for FirstLegs {
        fn name(&self) -> &str {
            "first_legs"
        }

        fn select(&self, qualified: Vec<Candidate>, _target_legs: usize) -> anyhow::Result<Vec<Candidate>> {
            Ok(qualified.into_iter().take(self.legs).collect())
        }
    }

    fn three_markets() -> InMemoryProvider {
        ["c", "b", "a"].into_iter().fold(InMemoryProvider::new(), |p, id| {
            p.with_candidate(market(1, id, "ann"), Some(30.0))
        })
    }

    #[tokio::test]
    async fn short_custom_lineup_places_no_bets() {
        let engine = BacktestEngine::new(
            config(1).with_target_legs(3, "top_edge"),
            Arc::new(three_markets()),
            registry(1.0, 0.6),
        )
        .with_lineup_selector(Arc::new(FirstLegs { legs: 1 }));

        let result = engine.run().await.unwrap();
        assert!(result.bets.is_empty());
        assert_eq!(result.days_simulated, 1);
    }

    #[tokio::test]
    async fn custom_lineup_is_capped_at_target_legs() {
        let engine = BacktestEngine::new(
            config(1).with_target_legs(2, "no_such_strategy"),
            Arc::new(three_markets()),
            registry(1.0, 0.6),
        )
        .with_lineup_selector(Arc::new(FirstLegs { legs: 3 }));

        let result = engine.run().await.unwrap();
        let ids: Vec<&str> = result.bets.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2024-01-01:a", "2024-01-01:b"]);
    }
}
