use std::collections::BTreeSet;

use betlab_core::{Candidate, MarketCandidate, RunConfig};

/// Threshold predicate deciding which candidates may be bet.
#[derive(Debug, Clone, PartialEq)]
pub struct QualificationFilter {
    pub min_confidence: f64,
    pub min_edge: f64,
    pub max_risk_score: f64,
    /// Allowed prop types. Empty allows everything.
    pub prop_types: BTreeSet<String>,
}

impl QualificationFilter {
    #[must_use]
    pub fn new(min_confidence: f64, min_edge: f64, max_risk_score: f64) -> Self {
        Self {
            min_confidence,
            min_edge,
            max_risk_score,
            prop_types: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_edge: config.min_edge,
            max_risk_score: config.max_risk_score,
            prop_types: config.prop_types.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn with_prop_types(mut self, prop_types: &[&str]) -> Self {
        self.prop_types = prop_types.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Prop-type gate, applied before any model is consulted.
    #[must_use]
    pub fn accepts_prop_type(&self, market: &MarketCandidate) -> bool {
        self.prop_types.is_empty() || self.prop_types.contains(&market.prop_type)
    }

    #[must_use]
    pub fn qualifies(&self, candidate: &Candidate) -> bool {
        candidate.consensus_confidence >= self.min_confidence
            && candidate.edge >= self.min_edge
            && candidate.risk_score <= self.max_risk_score
    }

    /// Returns the candidate with its `qualifies` flag set.
    #[must_use]
    pub fn apply(&self, mut candidate: Candidate) -> Candidate {
        candidate.qualifies = self.qualifies(&candidate);
        candidate
    }
}
