//! Built-in lineup selection strategies, tagged by name.

use anyhow::Result;
use betlab_core::{Candidate, ConfigurationError, LineupSelector};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineupStrategy {
    /// Highest edge first.
    TopEdge,
    /// Highest consensus confidence first.
    TopConfidence,
    /// Highest edge first, at most one leg per event.
    DistinctEvents,
}

impl LineupStrategy {
    pub const ALL: [Self; 3] = [Self::TopEdge, Self::TopConfidence, Self::DistinctEvents];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TopEdge => "top_edge",
            Self::TopConfidence => "top_confidence",
            Self::DistinctEvents => "distinct_events",
        }
    }

    /// Looks up a strategy by its tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownStrategy`] for an unknown tag.
    pub fn from_name(name: &str) -> Result<Self, ConfigurationError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| ConfigurationError::UnknownStrategy {
                name: name.to_string(),
                available: Self::ALL.map(Self::name).join(", "),
            })
    }

    fn rank(self, a: &Candidate, b: &Candidate) -> Ordering {
        let primary = match self {
            Self::TopEdge | Self::DistinctEvents => b.edge.total_cmp(&a.edge),
            Self::TopConfidence => b.consensus_confidence.total_cmp(&a.consensus_confidence),
        };
        primary.then_with(|| a.id().cmp(b.id()))
    }
}

impl LineupSelector for LineupStrategy {
    fn name(&self) -> &str {
        LineupStrategy::name(*self)
    }

    fn select(&self, mut qualified: Vec<Candidate>, target_legs: usize) -> Result<Vec<Candidate>> {
        qualified.sort_by(|a, b| self.rank(a, b));

        let picked: Vec<Candidate> = match self {
            Self::TopEdge | Self::TopConfidence => qualified.into_iter().take(target_legs).collect(),
            Self::DistinctEvents => {
                let mut events = BTreeSet::new();
                qualified
                    .into_iter()
                    .filter(|c| events.insert(c.market.event_id.clone()))
                    .take(target_legs)
                    .collect()
            }
        };

        if picked.len() < target_legs {
            tracing::debug!(
                "{} found {} of {} legs; no lineup",
                LineupStrategy::name(*self),
                picked.len(),
                target_legs
            );
            return Ok(Vec::new());
        }
        Ok(picked)
    }
}
