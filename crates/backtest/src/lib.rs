//! Backtest engine and risk analytics for player prop betting.
//!
//! The [`BacktestEngine`] walks a date range one day at a time: it fetches
//! the day's slate from a [`betlab_core::HistoricalDataProvider`], builds a
//! consensus [`betlab_core::Candidate`] per market, qualifies and sizes it,
//! settles it against the realized outcome and commits it to the
//! [`BankrollLedger`]. The [`RiskGovernor`] halts the run on stop-loss or
//! drawdown breaches; the [`MetricsEngine`] turns the ledger into a
//! [`PerformanceReport`].
//!
//! [`PerformanceTracker`] applies the same metrics to live bet records.

pub mod aggregator;
pub mod breakdown;
pub mod data_provider;
pub mod dataset;
pub mod engine;
pub mod governor;
pub mod ledger;
pub mod lineup;
pub mod live;
pub mod metrics;
pub mod qualification;
pub mod result;
pub mod simulator;
pub mod sizing;
pub mod state;

pub use aggregator::{PredictionAggregator, RawPrediction};
pub use breakdown::{ModelPerformance, PropTypePerformance, TimeSeriesPoint};
pub use data_provider::{CachedProvider, InMemoryProvider};
pub use dataset::{RecordedDataset, RecordedModel};
pub use engine::BacktestEngine;
pub use governor::{HaltReason, RiskGovernor};
pub use ledger::{BankrollLedger, BankrollState, DailySnapshot};
pub use lineup::LineupStrategy;
pub use live::{BetFilter, ClvAnalysis, PerformanceTracker};
pub use metrics::{CapitalSeries, MetricFlag, MetricsEngine, PerformanceReport, RiskMetrics};
pub use qualification::QualificationFilter;
pub use result::{RunResult, SkippedDay};
pub use simulator::BetSimulator;
pub use sizing::{StakeDecision, StakeSizer};
pub use state::RunState;
