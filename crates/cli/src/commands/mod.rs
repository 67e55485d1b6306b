//! CLI commands for the betlab engine.

pub mod analyze;
pub mod backtest;
pub mod report;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use backtest::{run_backtest, BacktestArgs};
