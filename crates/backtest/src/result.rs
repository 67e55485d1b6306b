use std::collections::BTreeMap;

use betlab_core::{RunConfig, SimulatedBet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::breakdown::{ModelPerformance, PropTypePerformance, TimeSeriesPoint};
use crate::metrics::PerformanceReport;
use crate::state::RunState;

/// A day that was skipped because the provider had no data for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: String,
}

/// Everything a run produced. Built exactly once, at termination.
///
/// Contains no wall-clock timestamps or random ids, so identical inputs
/// serialize to identical JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// `COMPLETED`, `HALTED_STOP_LOSS` or `HALTED_MAX_DRAWDOWN`.
    pub termination: RunState,
    /// The run stopped early on a cancellation request.
    pub cancelled: bool,
    pub config: RunConfig,
    pub summary: PerformanceReport,
    pub model_performance: BTreeMap<String, ModelPerformance>,
    pub prop_type_performance: BTreeMap<String, PropTypePerformance>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub bets: Vec<SimulatedBet>,
    /// Days with provider data that went through the decision loop.
    pub days_simulated: usize,
    pub skipped_days: Vec<SkippedDay>,
}

impl RunResult {
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.termination.is_halted()
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
