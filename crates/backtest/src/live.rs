//! Tracking of live bet records against the same metrics as the backtest.

use std::collections::VecDeque;

use betlab_core::odds;
use betlab_core::{BetOutcome, BetRecord, BetRecordError, Odds};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsEngine, PerformanceReport};

/// Most records kept; older ones are dropped first.
pub const MAX_HISTORY_SIZE: usize = 10_000;

/// Hours to close at which timing impact saturates.
const TIMING_HORIZON_HOURS: f64 = 48.0;

/// Selects records by market, tag and placement time. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetFilter {
    pub market: Option<String>,
    pub tag: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl BetFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_market(mut self, market: &str) -> Self {
        self.market = Some(market.to_string());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// Inclusive placement window.
    #[must_use]
    pub fn with_timeframe(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &BetRecord) -> bool {
        if let Some(market) = &self.market {
            if &record.market != market {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !record.metadata.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if self.from.is_some_and(|from| record.placed_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.placed_at > to) {
            return false;
        }
        true
    }
}

/// Bounded, most-recent-first history of live bets.
#[derive(Debug)]
pub struct PerformanceTracker {
    initial_capital: Decimal,
    capacity: usize,
    history: VecDeque<BetRecord>,
    metrics: MetricsEngine,
}

impl PerformanceTracker {
    #[must_use]
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            capacity: MAX_HISTORY_SIZE,
            history: VecDeque::new(),
            metrics: MetricsEngine::default(),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsEngine) -> Self {
        self.metrics = metrics;
        self
    }

    /// Adds a record, evicting the oldest once over capacity.
    pub fn record(&mut self, record: BetRecord) {
        self.history.push_front(record);
        while self.history.len() > self.capacity {
            if let Some(evicted) = self.history.pop_back() {
                tracing::debug!("Evicted bet {} from history", evicted.id);
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`BetRecordError::UnknownBet`] if no record has this id, or
    /// the record's own error if it was already closed.
    pub fn record_close(&mut self, id: &str, closing: Odds, at: DateTime<Utc>) -> Result<(), BetRecordError> {
        self.find_mut(id)?.record_close(closing, at)
    }

    /// # Errors
    ///
    /// Returns [`BetRecordError::UnknownBet`] if no record has this id, or
    /// the record's own error if it was already settled.
    pub fn settle(&mut self, id: &str, result: BetOutcome, at: DateTime<Utc>) -> Result<(), BetRecordError> {
        self.find_mut(id)?.settle(result, at)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut BetRecord, BetRecordError> {
        self.history
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BetRecordError::UnknownBet { id: id.to_string() })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BetRecord> {
        self.history.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Matching records, most recent first.
    #[must_use]
    pub fn history(&self, filter: &BetFilter) -> Vec<&BetRecord> {
        self.history.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Report over matching records ordered by `placed_at`. Records placed
    /// at the same instant keep the order they were recorded in.
    #[must_use]
    pub fn report(&self, filter: &BetFilter) -> PerformanceReport {
        let mut selected: Vec<BetRecord> = self
            .history
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.placed_at);
        self.metrics.report_from_bets(self.initial_capital, &selected)
    }
}

/// Closing-line analysis of a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClvAnalysis {
    /// CLV in percent.
    pub clv: f64,
    /// Edge retention in percent, 0 when the closing price has no edge.
    pub edge_retained: f64,
    /// `1 - |implied move| / (hours_to_close + 1)`.
    pub market_efficiency: f64,
    /// `clv / (hours_to_close + 1)`.
    pub time_value: f64,
    /// `min(1, hours_to_close / 48)`.
    pub timing_impact: f64,
    pub hours_to_close: f64,
}

impl ClvAnalysis {
    /// Returns `None` until closing odds are recorded, or when either price
    /// has no implied probability.
    #[must_use]
    pub fn analyze(record: &BetRecord) -> Option<Self> {
        let placed = record.placed_odds.to_decimal();
        let closing = record.closing_odds?.to_decimal();
        let clv = odds::closing_line_value(placed, closing)?;
        let movement = (odds::implied_probability(placed)? - odds::implied_probability(closing)?).abs();
        let hours = record.hours_to_close();

        Some(Self {
            clv,
            edge_retained: odds::edge_retention(placed, closing).unwrap_or(0.0),
            market_efficiency: 1.0 - movement / (hours + 1.0),
            time_value: clv / (hours + 1.0),
            timing_impact: (hours / TIMING_HORIZON_HOURS).min(1.0),
            hours_to_close: hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap()
    }

    fn record(id: &str, market: &str, day: u32, tags: &[&str]) -> BetRecord {
        BetRecord::new(market, Odds::Decimal(dec!(2.0)), dec!(100), at(day, 12))
            .with_id(id)
            .with_tags(tags)
    }

    #[test]
    fn history_is_bounded_most_recent_first() {
        let mut tracker = PerformanceTracker::new(dec!(1000)).with_capacity(3);
        for i in 1..=5 {
            tracker.record(record(&format!("b{i}"), "nfl", i, &[]));
        }

        assert_eq!(tracker.len(), 3);
        let ids: Vec<&str> = tracker
            .history(&BetFilter::all())
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b5", "b4", "b3"]);
        assert!(tracker.get("b1").is_none());
    }

    #[test]
    fn default_capacity() {
        let tracker = PerformanceTracker::new(dec!(1000));
        assert_eq!(tracker.capacity, MAX_HISTORY_SIZE);
        assert!(tracker.is_empty());
    }

    #[test]
    fn filters_by_market_tag_and_time() {
        let mut tracker = PerformanceTracker::new(dec!(1000));
        tracker.record(record("a", "nba", 1, &["sharp"]));
        tracker.record(record("b", "nfl", 2, &["sharp", "live"]));
        tracker.record(record("c", "nba", 3, &[]));

        assert_eq!(tracker.history(&BetFilter::all().with_market("nba")).len(), 2);
        assert_eq!(tracker.history(&BetFilter::all().with_tag("sharp")).len(), 2);
        assert_eq!(
            tracker
                .history(&BetFilter::all().with_timeframe(at(2, 0), at(3, 23)))
                .len(),
            2
        );
        let narrow = BetFilter::all().with_market("nba").with_tag("sharp");
        let picked = tracker.history(&narrow);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "a");
    }

    #[test]
    fn settle_and_close_through_tracker() {
        let mut tracker = PerformanceTracker::new(dec!(1000));
        tracker.record(record("a", "nba", 1, &[]));

        tracker
            .record_close("a", Odds::Decimal(dec!(2.5)), at(1, 18))
            .unwrap();
        tracker.settle("a", BetOutcome::Win, at(1, 23)).unwrap();

        assert!(matches!(
            tracker.settle("a", BetOutcome::Loss, at(2, 0)),
            Err(BetRecordError::AlreadySettled { .. })
        ));
        assert_eq!(
            tracker.settle("missing", BetOutcome::Win, at(2, 0)),
            Err(BetRecordError::UnknownBet {
                id: "missing".to_string()
            })
        );

        let report = tracker.report(&BetFilter::all());
        assert_eq!(report.wins, 1);
        assert_eq!(report.net_pnl, dec!(100));
        assert_eq!(report.roi, dec!(0.1));
        assert_eq!(report.clv_samples, 1);
    }

    #[test]
    fn report_respects_filter() {
        let mut tracker = PerformanceTracker::new(dec!(1000));
        tracker.record(record("a", "nba", 1, &[]));
        tracker.record(record("b", "nfl", 1, &[]));
        tracker.settle("a", BetOutcome::Win, at(1, 23)).unwrap();
        tracker.settle("b", BetOutcome::Loss, at(1, 23)).unwrap();

        let nba = tracker.report(&BetFilter::all().with_market("nba"));
        assert_eq!(nba.total_bets, 1);
        assert_eq!(nba.wins, 1);

        let all = tracker.report(&BetFilter::all());
        assert_eq!(all.net_pnl, Decimal::ZERO);
    }

    #[test]
    fn report_orders_by_placement_time() {
        let mut tracker = PerformanceTracker::new(dec!(1000));
        tracker.record(record("c", "nba", 3, &[]));
        tracker.record(record("a", "nba", 1, &[]));
        tracker.record(record("b", "nba", 2, &[]));
        tracker.settle("c", BetOutcome::Loss, at(3, 23)).unwrap();
        tracker.settle("a", BetOutcome::Loss, at(1, 23)).unwrap();
        tracker.settle("b", BetOutcome::Win, at(2, 23)).unwrap();

        // Recorded order would be loss, loss, win.
        let report = tracker.report(&BetFilter::all());
        assert_eq!(report.risk.max_consecutive_losses, 1);
        assert_eq!(report.total_bets, 3);
    }

    #[test]
    fn custom_metrics_reach_the_report() {
        let mut tracker =
            PerformanceTracker::new(dec!(1000)).with_metrics(MetricsEngine::default().with_var_confidence(0.9));
        tracker.record(record("a", "nba", 1, &[]));

        let report = tracker.report(&BetFilter::all());
        assert!((report.risk.var_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn clv_analysis_components() {
        let mut r = record("a", "nba", 1, &[]);
        r.record_close(Odds::Decimal(dec!(2.5)), r.placed_at + Duration::hours(11))
            .unwrap();

        let analysis = ClvAnalysis::analyze(&r).unwrap();
        assert!((analysis.clv - 20.0).abs() < 1e-9);
        assert!((analysis.hours_to_close - 11.0).abs() < 1e-9);
        assert!((analysis.time_value - 20.0 / 12.0).abs() < 1e-9);
        assert!((analysis.timing_impact - 11.0 / 48.0).abs() < 1e-9);
        // |0.5 - 0.4| / 12
        assert!((analysis.market_efficiency - (1.0 - 0.1 / 12.0)).abs() < 1e-9);
        assert!((analysis.edge_retained - 0.5 / 0.6 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn clv_analysis_requires_closing_odds() {
        assert!(ClvAnalysis::analyze(&record("a", "nba", 1, &[])).is_none());
    }

    #[test]
    fn timing_impact_saturates() {
        let mut r = record("a", "nba", 1, &[]);
        r.record_close(Odds::American(150), r.placed_at + Duration::hours(72))
            .unwrap();
        let analysis = ClvAnalysis::analyze(&r).unwrap();
        assert!((analysis.timing_impact - 1.0).abs() < 1e-12);
    }
}
