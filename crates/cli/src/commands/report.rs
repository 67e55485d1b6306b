//! Text rendering of backtest and live performance reports.

use anyhow::{anyhow, ensure, Result};
use betlab_backtest::{MetricsEngine, PerformanceReport, RunResult};
use rust_decimal::Decimal;

const RULE: &str = "===============================================================\n";
const DIVIDER: &str = "---------------------------------------------------------------\n";

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parses an output format from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!(
                "Unknown format: '{}'. Valid formats: text, json",
                s
            )),
        }
    }
}

/// Metrics engine reporting VaR and expected shortfall at `var_confidence`.
pub fn metrics_engine(var_confidence: f64) -> Result<MetricsEngine> {
    ensure!(
        var_confidence > 0.0 && var_confidence < 1.0,
        "VaR confidence must be between 0 and 1 (exclusive), got {}",
        var_confidence
    );
    Ok(MetricsEngine::default().with_var_confidence(var_confidence))
}

fn percent(value: Decimal) -> Decimal {
    (value * Decimal::ONE_HUNDRED).round_dp(2).normalize()
}

/// Formats a backtest run as a text report.
pub fn format_backtest_report(result: &RunResult) -> String {
    let config = &result.config;
    let mut output = String::new();

    output.push('\n');
    output.push_str(RULE);
    output.push_str("                        BACKTEST RESULTS                       \n");
    output.push_str(RULE);
    output.push_str(&format!(
        "Period: {} to {}\n",
        config.start_date, config.end_date
    ));
    output.push_str(&format!("Models: {}\n", config.models.join(", ")));
    output.push_str(&format!(
        "Thresholds: confidence >= {:.2}, edge >= {:.3}, risk <= {:.2}\n",
        config.min_confidence, config.min_edge, config.max_risk_score
    ));
    let termination = if result.cancelled {
        format!("{} (cancelled)", result.termination)
    } else {
        result.termination.to_string()
    };
    output.push_str(&format!("Termination: {}\n", termination));
    output.push_str(&format!(
        "Days: {} simulated, {} skipped\n",
        result.days_simulated,
        result.skipped_days.len()
    ));
    output.push('\n');

    output.push_str(&format_summary(&result.summary));

    if !result.model_performance.is_empty() {
        output.push_str("MODELS\n");
        output.push_str(DIVIDER);
        for (id, model) in &result.model_performance {
            output.push_str(&format!(
                "{:<16} acc {:>5.1}%  prec {:>5.1}%  rec {:>5.1}%  f1 {:.3}  P&L {:.2}\n",
                id,
                model.accuracy * 100.0,
                model.precision * 100.0,
                model.recall * 100.0,
                model.f1_score,
                model.profit_contribution
            ));
        }
        output.push('\n');
    }

    if !result.prop_type_performance.is_empty() {
        output.push_str("PROP TYPES\n");
        output.push_str(DIVIDER);
        for (prop_type, perf) in &result.prop_type_performance {
            output.push_str(&format!(
                "{:<16} bets {:>4}  win {:>5.1}%  ROI {:>6}%  edge {:.3}\n",
                prop_type,
                perf.total_bets,
                perf.win_rate * 100.0,
                percent(perf.roi),
                perf.average_edge
            ));
        }
        output.push('\n');
    }

    for skipped in &result.skipped_days {
        output.push_str(&format!("Skipped {}: {}\n", skipped.date, skipped.reason));
    }
    output.push_str(RULE);
    output
}

/// Formats the performance block shared by backtests and live analysis.
pub fn format_summary(report: &PerformanceReport) -> String {
    let risk = &report.risk;
    let mut output = String::new();

    output.push_str("CORE METRICS\n");
    output.push_str(DIVIDER);
    output.push_str(&format!("Total Bets:     {}\n", report.total_bets));
    output.push_str(&format!(
        "Wins:           {} ({:.1}%)\n",
        report.wins,
        report.win_rate * 100.0
    ));
    output.push_str(&format!("Losses:         {}\n", report.losses));
    if report.pushes > 0 {
        output.push_str(&format!("Pushes:         {}\n", report.pushes));
    }
    if report.pending > 0 {
        output.push_str(&format!("Pending:        {}\n", report.pending));
    }
    output.push_str(&format!("Average Edge:   {:.3}\n", report.average_edge));
    output.push('\n');

    output.push_str("FINANCIAL METRICS\n");
    output.push_str(DIVIDER);
    output.push_str(&format!("Total Stake:    ${:.2}\n", report.total_staked));
    output.push_str(&format!("Net P&L:        ${:.2}\n", report.net_pnl));
    output.push_str(&format!(
        "Bankroll:       ${:.2} -> ${:.2}\n",
        report.initial_capital, report.final_capital
    ));
    output.push_str(&format!("ROI:            {}%\n", percent(report.roi)));
    output.push('\n');

    output.push_str("RISK METRICS\n");
    output.push_str(DIVIDER);
    output.push_str(&format!("Sharpe Ratio:   {:.3}\n", risk.sharpe_ratio));
    output.push_str(&format!(
        "VaR ({:.0}%):      {:.4}\n",
        risk.var_confidence * 100.0,
        risk.value_at_risk
    ));
    output.push_str(&format!("Exp. Shortfall: {:.4}\n", risk.expected_shortfall));
    output.push_str(&format!("Max Drawdown:   {}%\n", percent(risk.max_drawdown)));
    output.push_str(&format!(
        "Max Consec. Losses: {}\n",
        risk.max_consecutive_losses
    ));
    output.push_str(&format!("Optimal Kelly:  {:.3}\n", risk.optimal_kelly_fraction));
    output.push('\n');

    output.push_str("MARKET METRICS\n");
    output.push_str(DIVIDER);
    output.push_str(&format!(
        "Average CLV:    {:.2}% ({} samples)\n",
        report.average_clv, report.clv_samples
    ));
    output.push_str(&format!("Edge Retention: {:.1}%\n", report.edge_retention));
    output.push_str(&format!(
        "Efficiency:     {:.3}\n",
        report.market_efficiency_score
    ));
    output.push_str(&format!("Sharpness:      {:.3}\n", report.sharpness_score));
    if !report.flags.is_empty() {
        let flags: Vec<String> = report.flags.iter().map(|f| format!("{f:?}")).collect();
        output.push_str(&format!("Flags:          {}\n", flags.join(", ")));
    }
    output.push('\n');

    output
}
