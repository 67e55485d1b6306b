use clap::{Parser, Subcommand};

mod commands;

use commands::{AnalyzeArgs, BacktestArgs};

#[derive(Parser)]
#[command(name = "betlab")]
#[command(about = "Backtest and risk analytics for player prop betting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded predictions over a date range and report performance
    Backtest(BacktestArgs),
    /// Compute a performance report from live bet records
    Analyze(AnalyzeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Backtest(args) => {
            commands::run_backtest(args).await?;
        }
        Commands::Analyze(args) => {
            commands::run_analyze(args)?;
        }
    }

    Ok(())
}
