//! Live bet records.
//!
//! A record is created when a bet is placed, receives closing odds once when
//! the market closes, and receives a result once when the event resolves.
//! Any further attempt at either update is rejected.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::bet::{BetOutcome, SettledBet};
use crate::odds::{self, Odds};

/// Errors raised when updating a [`BetRecord`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BetRecordError {
    /// Closing odds were already recorded.
    #[error("bet {id} already has closing odds")]
    AlreadyClosed { id: String },

    /// The result was already recorded.
    #[error("bet {id} is already settled as {result}")]
    AlreadySettled { id: String, result: BetOutcome },

    /// `PENDING` is not a settlement.
    #[error("bet {id} cannot be settled as PENDING")]
    PendingSettlement { id: String },

    /// No record with this id.
    #[error("unknown bet {id}")]
    UnknownBet { id: String },
}

/// Free-form details attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetMetadata {
    /// Edge estimated at placement.
    #[serde(default)]
    pub edge: f64,
    /// Closing line value in percent, filled when closing odds arrive.
    #[serde(default)]
    pub clv: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A bet placed outside the simulator and tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: String,
    pub market: String,
    pub placed_odds: Odds,
    #[serde(default)]
    pub closing_odds: Option<Odds>,
    pub stake: Decimal,
    pub result: BetOutcome,
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BetMetadata,
}

impl BetRecord {
    /// Creates a pending record with a fresh id.
    #[must_use]
    pub fn new(market: &str, placed_odds: Odds, stake: Decimal, placed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            market: market.to_string(),
            placed_odds,
            closing_odds: None,
            stake,
            result: BetOutcome::Pending,
            placed_at,
            closed_at: None,
            settled_at: None,
            metadata: BetMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    #[must_use]
    pub fn with_edge(mut self, edge: f64) -> Self {
        self.metadata.edge = edge;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.metadata.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Attaches closing odds and computes CLV.
    ///
    /// # Errors
    ///
    /// Returns [`BetRecordError::AlreadyClosed`] if closing odds were already recorded.
    pub fn record_close(&mut self, closing: Odds, at: DateTime<Utc>) -> Result<(), BetRecordError> {
        if self.closing_odds.is_some() {
            return Err(BetRecordError::AlreadyClosed { id: self.id.clone() });
        }
        self.closing_odds = Some(closing);
        self.closed_at = Some(at);
        self.metadata.clv =
            odds::closing_line_value(self.placed_odds.to_decimal(), closing.to_decimal());
        Ok(())
    }

    /// Attaches the final result.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is already settled or `result` is `Pending`.
    pub fn settle(&mut self, result: BetOutcome, at: DateTime<Utc>) -> Result<(), BetRecordError> {
        if result == BetOutcome::Pending {
            return Err(BetRecordError::PendingSettlement { id: self.id.clone() });
        }
        if self.result != BetOutcome::Pending {
            return Err(BetRecordError::AlreadySettled {
                id: self.id.clone(),
                result: self.result,
            });
        }
        self.result = result;
        self.settled_at = Some(at);
        Ok(())
    }

    /// Hours between placement and market close, 0 when not closed.
    #[must_use]
    pub fn hours_to_close(&self) -> f64 {
        self.closed_at.map_or(0.0, |closed| {
            (closed - self.placed_at).num_seconds().max(0) as f64 / 3600.0
        })
    }
}

impl SettledBet for BetRecord {
    fn outcome(&self) -> BetOutcome {
        self.result
    }

    fn stake(&self) -> Decimal {
        self.stake
    }

    fn pnl(&self) -> Decimal {
        self.result.pnl(self.stake, self.placed_odds.to_decimal())
    }

    fn placed_odds(&self) -> Decimal {
        self.placed_odds.to_decimal()
    }

    fn closing_odds(&self) -> Option<Decimal> {
        self.closing_odds.map(Odds::to_decimal)
    }

    fn edge(&self) -> f64 {
        self.metadata.edge
    }

    fn settled_on(&self) -> NaiveDate {
        self.settled_at.unwrap_or(self.placed_at).date_naive()
    }
}
