use crate::candidate::{Candidate, MarketCandidate, ModelOutput};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of historical betting opportunities and their realized results.
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Candidates available on `date`. `Ok(None)` and `Err(_)` both mean the
    /// day has no usable data.
    async fn slate(&self, date: NaiveDate) -> Result<Option<Vec<MarketCandidate>>>;

    /// Realized stat value for a candidate, `None` when unresolved.
    async fn outcome(&self, candidate: &MarketCandidate) -> Result<Option<f64>>;
}

/// A predictive model, treated as a black box.
#[async_trait]
pub trait PredictionModel: Send + Sync {
    fn id(&self) -> &str;

    /// Hit rate used to weight this model in the consensus (0 to 1).
    fn historical_accuracy(&self) -> f64;

    async fn predict(&self, candidate: &MarketCandidate) -> Result<ModelOutput>;
}

/// Narrows qualified candidates to a legal multi-leg combination.
pub trait LineupSelector: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `target_legs` candidates, or none when no legal combination
    /// exists. The engine bets nothing on a shorter lineup and drops legs
    /// beyond the target.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine treats a failure as "no lineup".
    fn select(&self, qualified: Vec<Candidate>, target_legs: usize) -> Result<Vec<Candidate>>;
}
