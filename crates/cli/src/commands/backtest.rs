//! Backtest CLI command.
//!
//! Replays a recorded slate file (CSV or JSON) through the backtest engine
//! under a figment-layered run configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::watch;

use betlab_backtest::metrics::DEFAULT_VAR_CONFIDENCE;
use betlab_backtest::{BacktestEngine, CachedProvider, RecordedDataset};
use betlab_core::config_loader::DEFAULT_CONFIG_PATH;
use betlab_core::ConfigLoader;

use super::report::{format_backtest_report, metrics_engine, OutputFormat};

/// Arguments for the backtest command.
#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Run configuration (TOML; `BETLAB_*` env vars and a sibling JSON file override it)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "BETLAB_CONFIG")]
    pub config: String,

    /// Profile overlay, loaded from `<config stem>.<profile>.toml`
    #[arg(long)]
    pub profile: Option<String>,

    /// Recorded slate file with candidates, outcomes and model predictions (.csv or .json)
    #[arg(short, long)]
    pub data: String,

    /// Override the configured worker pool size
    #[arg(long)]
    pub workers: Option<usize>,

    /// Slate cache TTL in seconds
    #[arg(long, default_value = "300")]
    pub cache_ttl_secs: u64,

    /// Confidence level for VaR and expected shortfall
    #[arg(long, default_value_t = DEFAULT_VAR_CONFIDENCE)]
    pub var_confidence: f64,

    /// Output JSON results to file
    #[arg(long)]
    pub output: Option<String>,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Runs the backtest command.
///
/// # Errors
/// Returns an error if the configuration or data file cannot be loaded, or
/// the engine rejects the configuration.
pub async fn run_backtest(args: BacktestArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.format)?;
    let metrics = metrics_engine(args.var_confidence)?;

    let mut config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(&args.config, profile)?,
        None => ConfigLoader::load_from(&args.config)?,
    };
    if let Some(workers) = args.workers {
        config = config.with_worker_count(workers);
    }

    let dataset = RecordedDataset::load(&args.data)?;
    let provider = CachedProvider::new(
        dataset.provider(),
        Duration::from_secs(args.cache_ttl_secs),
    );
    tracing::info!(
        "Loaded {} candidate(s) and {} model(s) from {}",
        dataset.candidates.len(),
        dataset.models.len(),
        args.data
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping at the next day boundary");
            let _ = cancel_tx.send(true);
        }
    });

    let engine = BacktestEngine::new(config, Arc::new(provider), dataset.registry())
        .with_cancellation(cancel_rx)
        .with_metrics(metrics);
    let result = engine.run().await.context("Backtest failed")?;

    match format {
        OutputFormat::Text => {
            println!("{}", format_backtest_report(&result));
        }
        OutputFormat::Json => {
            println!("{}", result.to_json()?);
        }
    }

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, result.to_json()?)
            .with_context(|| format!("Failed to write results to {output_path}"))?;
        tracing::info!("Results written to {}", output_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SLATE: &str = "\
date,id,event_id,player,prop_type,line,over_odds,under_odds,closing_over,closing_under,risk_score,realized,model_id,model_value,model_confidence,model_accuracy
2024-03-01,embiid,phi-bos,Joel Embiid,points,31.5,2.0,1.8,,,0.2,35,xgb,34.0,0.62,0.9
2024-03-02,tatum,bos-nyk,Jayson Tatum,points,27.5,2.0,1.8,,,0.2,22,xgb,29.0,0.62,0.9
";

    const CONFIG: &str = r#"
start_date = "2024-03-01"
end_date = "2024-03-03"
models = ["xgb"]
initial_bankroll = "1000"

[stake]
mode = "fixed"
amount = "20"

[risk]
max_position_fraction = "0.05"
stop_loss_fraction = "0.5"
max_drawdown_fraction = "0.3"
"#;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn runs_backtest_and_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(&dir, "Backtest.toml", CONFIG);
        let data = write(&dir, "slate.csv", SLATE);
        let output = dir.path().join("result.json");

        run_backtest(BacktestArgs {
            config,
            profile: None,
            data,
            workers: Some(2),
            cache_ttl_secs: 60,
            var_confidence: 0.9,
            output: Some(output.to_string_lossy().into_owned()),
            format: "text".to_string(),
        })
        .await
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["termination"], "COMPLETED");
        assert_eq!(json["bets"].as_array().unwrap().len(), 2);
        assert_eq!(json["config"]["worker_count"], 2);
        assert_eq!(json["skipped_days"][0]["date"], "2024-03-03");
        assert_eq!(json["summary"]["risk"]["var_confidence"], 0.9);
    }

    #[tokio::test]
    async fn rejects_unknown_format() {
        let err = run_backtest(BacktestArgs {
            config: "missing.toml".to_string(),
            profile: None,
            data: "missing.csv".to_string(),
            workers: None,
            cache_ttl_secs: 60,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
            output: None,
            format: "yaml".to_string(),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[derive(clap::Parser)]
    struct Harness {
        #[command(flatten)]
        args: BacktestArgs,
    }

    #[test]
    fn argument_defaults() {
        use clap::Parser;

        let parsed = Harness::try_parse_from(["betlab", "--data", "slate.csv"]).unwrap();
        if std::env::var_os("BETLAB_CONFIG").is_none() {
            assert_eq!(parsed.args.config, DEFAULT_CONFIG_PATH);
        }
        assert!((parsed.args.var_confidence - DEFAULT_VAR_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(parsed.args.cache_ttl_secs, 300);
    }
}
