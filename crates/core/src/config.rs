use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Immutable configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// First simulated day (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated day (inclusive).
    pub end_date: NaiveDate,
    /// Model identifiers to combine, looked up in the model registry.
    pub models: Vec<String>,
    /// Prop types to consider. Empty means all.
    #[serde(default)]
    pub prop_types: Vec<String>,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub min_edge: f64,
    #[serde(default = "default_max_risk_score")]
    pub max_risk_score: f64,
    /// Legs per lineup. Values above 1 route qualified candidates through the
    /// lineup selector.
    #[serde(default = "default_target_legs")]
    pub target_legs: usize,
    pub initial_bankroll: Decimal,
    pub stake: StakeMode,
    pub risk: RiskLimits,
    /// Size of the per-day prediction worker pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Algorithm tag of the built-in lineup selector.
    #[serde(default = "default_lineup_strategy")]
    pub lineup_strategy: String,
}

/// How stakes are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StakeMode {
    /// Flat stake, capped by `max_position_fraction` of bankroll.
    Fixed { amount: Decimal },
    /// Half Kelly, clamped to `[0, max_position_fraction]`.
    Kelly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_fraction: Decimal,
    pub stop_loss_fraction: Decimal,
    pub max_drawdown_fraction: Decimal,
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_max_risk_score() -> f64 {
    1.0
}

fn default_target_legs() -> usize {
    1
}

fn default_worker_count() -> usize {
    4
}

fn default_lineup_strategy() -> String {
    "top_edge".to_string()
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_fraction: Decimal::new(5, 2), // 0.05
            stop_loss_fraction: Decimal::new(5, 1),    // 0.5
            max_drawdown_fraction: Decimal::new(3, 1), // 0.3
        }
    }
}

impl RunConfig {
    /// Creates a config with default thresholds, Kelly staking and default
    /// risk limits.
    #[must_use]
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        models: Vec<String>,
        initial_bankroll: Decimal,
    ) -> Self {
        Self {
            start_date,
            end_date,
            models,
            prop_types: Vec::new(),
            min_confidence: default_min_confidence(),
            min_edge: 0.0,
            max_risk_score: default_max_risk_score(),
            target_legs: default_target_legs(),
            initial_bankroll,
            stake: StakeMode::Kelly,
            risk: RiskLimits::default(),
            worker_count: default_worker_count(),
            lineup_strategy: default_lineup_strategy(),
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, min_confidence: f64, min_edge: f64, max_risk_score: f64) -> Self {
        self.min_confidence = min_confidence;
        self.min_edge = min_edge;
        self.max_risk_score = max_risk_score;
        self
    }

    #[must_use]
    pub fn with_stake(mut self, stake: StakeMode) -> Self {
        self.stake = stake;
        self
    }

    #[must_use]
    pub fn with_risk_limits(mut self, risk: RiskLimits) -> Self {
        self.risk = risk;
        self
    }

    #[must_use]
    pub fn with_prop_types(mut self, prop_types: Vec<String>) -> Self {
        self.prop_types = prop_types;
        self
    }

    #[must_use]
    pub fn with_target_legs(mut self, legs: usize, strategy: &str) -> Self {
        self.target_legs = legs;
        self.lineup_strategy = strategy.to_string();
        self
    }

    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Iterates the simulated days, inclusive of both ends.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |day| *day <= self.end_date)
    }

    /// Validates ranges and required fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found, naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.start_date > self.end_date {
            return Err(ConfigurationError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.models.is_empty() {
            return Err(ConfigurationError::EmptyModelSet);
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigurationError::invalid("models", "model ids must not be blank"));
        }
        check_unit("min_confidence", self.min_confidence)?;
        check_unit("min_edge", self.min_edge)?;
        check_unit("max_risk_score", self.max_risk_score)?;
        if self.target_legs == 0 {
            return Err(ConfigurationError::invalid("target_legs", "must be at least 1"));
        }
        if self.worker_count == 0 {
            return Err(ConfigurationError::invalid("worker_count", "must be at least 1"));
        }
        if self.initial_bankroll <= Decimal::ZERO {
            return Err(ConfigurationError::invalid(
                "initial_bankroll",
                format!("must be positive, got {}", self.initial_bankroll),
            ));
        }
        if let StakeMode::Fixed { amount } = self.stake {
            if amount <= Decimal::ZERO {
                return Err(ConfigurationError::invalid(
                    "stake.amount",
                    format!("must be positive, got {amount}"),
                ));
            }
        }
        // Strictly below 1 so a single losing bet can never empty the bankroll.
        let position = self.risk.max_position_fraction;
        if position <= Decimal::ZERO || position >= Decimal::ONE {
            return Err(ConfigurationError::invalid(
                "risk.max_position_fraction",
                format!("must be within (0, 1), got {position}"),
            ));
        }
        check_fraction("risk.stop_loss_fraction", self.risk.stop_loss_fraction)?;
        check_fraction("risk.max_drawdown_fraction", self.risk.max_drawdown_fraction)?;
        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}

fn check_fraction(field: &'static str, value: Decimal) -> Result<(), ConfigurationError> {
    if value > Decimal::ZERO && value <= Decimal::ONE {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            field,
            format!("must be within (0, 1], got {value}"),
        ))
    }
}
