//! Executed bets and the common view the metrics layer reads them through.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, Side};

/// Result of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetOutcome {
    Win,
    Loss,
    /// Realized value landed exactly on the line; stake returned.
    Push,
    /// Not resolved yet.
    Pending,
}

impl BetOutcome {
    /// Returns true for `Win` or `Loss`.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Win | Self::Loss)
    }

    /// Profit or loss for a stake at decimal odds.
    #[must_use]
    pub fn pnl(&self, stake: Decimal, decimal_odds: Decimal) -> Decimal {
        match self {
            Self::Win => stake * (decimal_odds - Decimal::ONE),
            Self::Loss => -stake,
            Self::Push | Self::Pending => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Push => write!(f, "PUSH"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// Immutable record of one simulated bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBet {
    /// `<date>:<candidate id>`
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    /// Snapshot of the candidate as it was when the bet was placed.
    pub candidate: Candidate,
    pub side: Side,
    pub stake: Decimal,
    /// Decimal odds taken.
    pub odds: Decimal,
    pub realized_value: f64,
    pub outcome: BetOutcome,
    pub pnl: Decimal,
}

/// Read-only view over anything that was staked and (possibly) settled.
///
/// Lets the metrics engine score simulated bets and live bet records alike.
pub trait SettledBet {
    fn outcome(&self) -> BetOutcome;

    fn stake(&self) -> Decimal;

    fn pnl(&self) -> Decimal;

    /// Decimal odds at placement.
    fn placed_odds(&self) -> Decimal;

    /// Decimal closing odds, when the market close was observed.
    fn closing_odds(&self) -> Option<Decimal>;

    /// Edge recorded when the bet was placed.
    fn edge(&self) -> f64;

    /// Day the bet is attributed to for daily aggregation.
    fn settled_on(&self) -> NaiveDate;
}

impl SettledBet for SimulatedBet {
    fn outcome(&self) -> BetOutcome {
        self.outcome
    }

    fn stake(&self) -> Decimal {
        self.stake
    }

    fn pnl(&self) -> Decimal {
        self.pnl
    }

    fn placed_odds(&self) -> Decimal {
        self.odds
    }

    fn closing_odds(&self) -> Option<Decimal> {
        self.candidate.closing_odds()
    }

    fn edge(&self) -> f64 {
        self.candidate.edge
    }

    fn settled_on(&self) -> NaiveDate {
        self.date
    }
}
