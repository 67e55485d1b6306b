//! Error taxonomy for backtest runs.
//!
//! Only configuration problems and ledger invariant violations are fatal.
//! Data gaps are reported but recovered by skipping the day; arithmetic edge
//! cases never surface as errors (see the metric flags in the backtest crate).

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal configuration problems. Raised before a run starts, or when model
/// weights collapse to zero during aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("model '{model_id}' is referenced in the configuration but not registered")]
    MissingModel { model_id: String },

    #[error("no models configured")]
    EmptyModelSet,

    #[error("all model weights are zero for {context}")]
    ZeroWeight { context: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown lineup strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// A simulated day for which the provider had no data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no provider data for {date}: {reason}")]
pub struct DataGapError {
    pub date: NaiveDate,
    pub reason: String,
}

/// Errors that abort a backtest run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("ledger invariant violated: {0}")]
    Invariant(String),
}
