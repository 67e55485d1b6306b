//! Betting candidates: the raw market offered on a day, and the analysed
//! candidate produced once model predictions have been combined.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an over/under prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    /// Picks the side a projection favours. A projection exactly on the line
    /// goes over.
    #[must_use]
    pub fn from_projection(projection: f64, line: f64) -> Self {
        if projection >= line {
            Self::Over
        } else {
            Self::Under
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Over => write!(f, "over"),
            Self::Under => write!(f, "under"),
        }
    }
}

/// Decimal odds posted for both sides of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedOdds {
    pub over: Decimal,
    pub under: Decimal,
}

impl PostedOdds {
    /// Same price on both sides.
    #[must_use]
    pub fn even(price: Decimal) -> Self {
        Self {
            over: price,
            under: price,
        }
    }

    #[must_use]
    pub fn for_side(&self, side: Side) -> Decimal {
        match side {
            Side::Over => self.over,
            Side::Under => self.under,
        }
    }
}

/// One betting opportunity as offered by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCandidate {
    /// Identifier, unique within a day.
    pub id: String,
    pub date: NaiveDate,
    pub event_id: String,
    pub player: String,
    pub prop_type: String,
    pub line: f64,
    pub odds: PostedOdds,
    #[serde(default)]
    pub closing_odds: Option<PostedOdds>,
    /// Provider-supplied risk score; computed from model dispersion when absent.
    #[serde(default)]
    pub risk_score: Option<f64>,
}

impl MarketCandidate {
    /// Key unique across a whole run: `<date>:<id>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.date, self.id)
    }
}

/// What a model returns for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Projected stat value, compared against the line.
    pub value: f64,
    /// Confidence in the projection, read as the win probability of the
    /// side the projection favours.
    pub confidence: f64,
}

/// A single model's contribution to a consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub model_id: String,
    pub value: f64,
    pub confidence: f64,
    /// Historical accuracy of the model at the time of the run.
    pub accuracy: f64,
    /// Normalized share of the consensus weight (sums to 1 across models).
    pub weight_share: f64,
}

/// A candidate after prediction aggregation and qualification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub market: MarketCandidate,
    pub predictions: Vec<ModelPrediction>,
    pub consensus_prediction: f64,
    pub consensus_confidence: f64,
    pub side: Side,
    /// Implied probability of the posted price on `side`.
    pub implied_probability: f64,
    pub edge: f64,
    pub risk_score: f64,
    pub qualifies: bool,
}

impl Candidate {
    /// Decimal odds for the chosen side.
    #[must_use]
    pub fn posted_odds(&self) -> Decimal {
        self.market.odds.for_side(self.side)
    }

    /// Closing decimal odds for the chosen side, when known.
    #[must_use]
    pub fn closing_odds(&self) -> Option<Decimal> {
        self.market.closing_odds.map(|odds| odds.for_side(self.side))
    }

    /// Estimated probability that `side` wins.
    #[must_use]
    pub fn win_probability(&self) -> f64 {
        self.consensus_confidence
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.market.id
    }
}
