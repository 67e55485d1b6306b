use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use betlab_core::{HistoricalDataProvider, MarketCandidate, TtlCache};
use chrono::NaiveDate;

/// Provider backed by slates and outcomes held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    slates: BTreeMap<NaiveDate, Vec<MarketCandidate>>,
    /// Realized values keyed by [`MarketCandidate::key`].
    outcomes: HashMap<String, f64>,
}

impl InMemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds candidates to the slate of their own date.
    pub fn add_candidate(&mut self, candidate: MarketCandidate) {
        self.slates.entry(candidate.date).or_default().push(candidate);
    }

    pub fn add_outcome(&mut self, candidate_key: &str, realized_value: f64) {
        self.outcomes.insert(candidate_key.to_string(), realized_value);
    }

    #[must_use]
    pub fn with_candidate(mut self, candidate: MarketCandidate, realized_value: Option<f64>) -> Self {
        if let Some(value) = realized_value {
            self.add_outcome(&candidate.key(), value);
        }
        self.add_candidate(candidate);
        self
    }

    /// Registers an empty slate: the day has data but nothing to bet.
    #[must_use]
    pub fn with_empty_slate(mut self, date: NaiveDate) -> Self {
        self.slates.entry(date).or_default();
        self
    }

    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.slates.keys().copied().collect()
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.slates.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl HistoricalDataProvider for InMemoryProvider {
    async fn slate(&self, date: NaiveDate) -> Result<Option<Vec<MarketCandidate>>> {
        Ok(self.slates.get(&date).cloned())
    }

    async fn outcome(&self, candidate: &MarketCandidate) -> Result<Option<f64>> {
        Ok(self.outcomes.get(&candidate.key()).copied())
    }
}

/// Wraps a provider with a TTL cache over slate lookups.
///
/// Only successful lookups are cached; errors pass through so the next call
/// retries. Outcomes are cached once resolved. Expired entries are purged
/// on every insert.
pub struct CachedProvider<P> {
    inner: P,
    slates: TtlCache<NaiveDate, Option<Vec<MarketCandidate>>>,
    outcomes: TtlCache<String, f64>,
}

impl<P: HistoricalDataProvider> CachedProvider<P> {
    #[must_use]
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            slates: TtlCache::new(ttl),
            outcomes: TtlCache::new(ttl),
        }
    }

    pub fn invalidate(&self, date: NaiveDate) {
        self.slates.invalidate(&date);
    }
}

#[async_trait]
impl<P: HistoricalDataProvider> HistoricalDataProvider for CachedProvider<P> {
    async fn slate(&self, date: NaiveDate) -> Result<Option<Vec<MarketCandidate>>> {
        if let Some(cached) = self.slates.get(&date) {
            tracing::trace!("Slate cache hit for {}", date);
            return Ok(cached);
        }
        let slate = self.inner.slate(date).await?;
        self.slates.purge_expired();
        self.slates.insert(date, slate.clone());
        Ok(slate)
    }

    async fn outcome(&self, candidate: &MarketCandidate) -> Result<Option<f64>> {
        let key = candidate.key();
        if let Some(value) = self.outcomes.get(&key) {
            return Ok(Some(value));
        }
        let outcome = self.inner.outcome(candidate).await?;
        if let Some(value) = outcome {
            self.outcomes.purge_expired();
            self.outcomes.insert(key, value);
        }
        Ok(outcome)
    }
}
