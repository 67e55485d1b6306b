//! Analyze CLI command.
//!
//! Loads live bet records from JSON and reports on them with the same
//! metrics as a backtest, plus closing-line analysis per bet.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;

use betlab_backtest::metrics::DEFAULT_VAR_CONFIDENCE;
use betlab_backtest::{BetFilter, ClvAnalysis, MetricsEngine, PerformanceReport, PerformanceTracker};
use betlab_core::BetRecord;

use super::report::{format_summary, metrics_engine, OutputFormat};

/// Arguments for the analyze command.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// JSON file holding an array of bet records, oldest first
    #[arg(short, long)]
    pub records: String,

    /// Capital the records were placed against
    #[arg(long, default_value = "10000")]
    pub initial_capital: Decimal,

    /// Only include bets on this market
    #[arg(long)]
    pub market: Option<String>,

    /// Only include bets carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only include bets placed at or after this time (RFC 3339)
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,

    /// Only include bets placed at or before this time (RFC 3339)
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Confidence level for VaR and expected shortfall
    #[arg(long, default_value_t = DEFAULT_VAR_CONFIDENCE)]
    pub var_confidence: f64,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,
}

impl AnalyzeArgs {
    fn filter(&self) -> BetFilter {
        BetFilter {
            market: self.market.clone(),
            tag: self.tag.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

/// CLV analysis of one bet record.
#[derive(Debug, Serialize)]
pub struct BetClv {
    pub id: String,
    pub market: String,
    #[serde(flatten)]
    pub analysis: ClvAnalysis,
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub report: PerformanceReport,
    pub clv: Vec<BetClv>,
}

fn load_records(path: impl AsRef<Path>) -> Result<Vec<BetRecord>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bet records from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse bet records in {}", path.display()))
}

/// Builds the report and per-bet CLV analysis for the filtered records.
/// Every record in the file is kept, however many there are.
pub fn analyze(
    records: Vec<BetRecord>,
    initial_capital: Decimal,
    metrics: MetricsEngine,
    filter: &BetFilter,
) -> Analysis {
    let mut tracker = PerformanceTracker::new(initial_capital)
        .with_capacity(records.len())
        .with_metrics(metrics);
    for record in records {
        tracker.record(record);
    }

    let mut clv: Vec<BetClv> = tracker
        .history(filter)
        .into_iter()
        .filter_map(|record| {
            ClvAnalysis::analyze(record).map(|analysis| BetClv {
                id: record.id.clone(),
                market: record.market.clone(),
                analysis,
            })
        })
        .collect();
    clv.reverse();

    Analysis {
        report: tracker.report(filter),
        clv,
    }
}

fn format_clv(rows: &[BetClv]) -> String {
    let mut output = String::new();
    output.push_str("CLOSING LINE\n");
    output.push_str("---------------------------------------------------------------\n");
    for row in rows {
        output.push_str(&format!(
            "{:<20} CLV {:>7.2}%  retained {:>6.1}%  {:>5.1}h to close  timing {:.2}\n",
            row.id,
            row.analysis.clv,
            row.analysis.edge_retained,
            row.analysis.hours_to_close,
            row.analysis.timing_impact
        ));
    }
    output
}

/// Runs the analyze command.
///
/// # Errors
/// Returns an error if the records file cannot be read or parsed.
pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.format)?;
    let metrics = metrics_engine(args.var_confidence)?;
    let records = load_records(&args.records)?;
    tracing::info!("Loaded {} bet record(s) from {}", records.len(), args.records);

    let filter = args.filter();
    let analysis = analyze(records, args.initial_capital, metrics, &filter);

    match format {
        OutputFormat::Text => {
            println!("{}", format_summary(&analysis.report));
            if !analysis.clv.is_empty() {
                println!("{}", format_clv(&analysis.clv));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use betlab_core::{BetOutcome, Odds};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn records() -> Vec<BetRecord> {
        let placed_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut closed = BetRecord::new("nba", Odds::Decimal(dec!(2.0)), dec!(100), placed_at)
            .with_id("closed")
            .with_tags(&["sharp"]);
        closed
            .record_close(Odds::Decimal(dec!(1.8)), placed_at + Duration::hours(5))
            .unwrap();
        closed.settle(BetOutcome::Win, placed_at + Duration::hours(8)).unwrap();

        let mut lost = BetRecord::new("nfl", Odds::American(-110), dec!(50), placed_at + Duration::hours(1))
            .with_id("lost");
        lost.settle(BetOutcome::Loss, placed_at + Duration::hours(9)).unwrap();

        vec![closed, lost]
    }

    #[test]
    fn analyzes_all_records() {
        let analysis = analyze(records(), dec!(1000), MetricsEngine::default(), &BetFilter::all());

        assert_eq!(analysis.report.total_bets, 2);
        assert_eq!(analysis.report.net_pnl, dec!(50));
        assert_eq!(analysis.clv.len(), 1);
        assert_eq!(analysis.clv[0].id, "closed");
        assert!(analysis.clv[0].analysis.clv < 0.0);
    }

    #[test]
    fn filters_by_market() {
        let analysis = analyze(
            records(),
            dec!(1000),
            MetricsEngine::default(),
            &BetFilter::all().with_market("nfl"),
        );

        assert_eq!(analysis.report.total_bets, 1);
        assert_eq!(analysis.report.losses, 1);
        assert!(analysis.clv.is_empty());
    }

    #[test]
    fn keeps_every_record_beyond_live_history_limit() {
        let placed_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let count = betlab_backtest::live::MAX_HISTORY_SIZE + 2_000;
        let records: Vec<BetRecord> = (0..count)
            .map(|i| {
                let at = placed_at + Duration::seconds(i as i64);
                let mut record = BetRecord::new("nba", Odds::Decimal(dec!(2.0)), dec!(1), at)
                    .with_id(&format!("bet-{i}"));
                record.settle(BetOutcome::Win, at).unwrap();
                record
            })
            .collect();

        let analysis = analyze(records, dec!(100000), MetricsEngine::default(), &BetFilter::all());

        assert_eq!(analysis.report.total_bets, count);
        assert_eq!(analysis.report.net_pnl, Decimal::from(count));
    }

    #[test]
    fn var_confidence_reaches_report() {
        let analysis = analyze(
            records(),
            dec!(1000),
            metrics_engine(0.9).unwrap(),
            &BetFilter::all(),
        );
        assert!((analysis.report.risk.var_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn loads_records_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bets.json");
        std::fs::write(&path, serde_json::to_string(&records()).unwrap()).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, records());

        std::fs::write(&path, "{not json").unwrap();
        let err = load_records(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse bet records"));
    }
}
