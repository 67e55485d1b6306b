//! Prediction aggregation.
//!
//! Combines per-model outputs for one market into a consensus:
//!
//! ```text
//! w_i        = accuracy_i * confidence_i
//! prediction = sum(w_i * value_i) / sum(w_i)
//! confidence = sum(accuracy_i * confidence_i) / sum(accuracy_i)
//! side       = over if prediction >= line else under
//! edge       = |confidence - implied_probability(odds[side])|
//! ```
//!
//! When the provider has no risk score, one is derived from the consensus
//! confidence and the weighted dispersion of model values around the line:
//!
//! ```text
//! risk = 0.5 * (1 - confidence) + 0.5 * min(1, weighted_std(values) / max(|line|, 1))
//! ```

use betlab_core::odds;
use betlab_core::{Candidate, ConfigurationError, MarketCandidate, ModelOutput, ModelPrediction, Side};

/// One model's raw output for a market, with the model's accuracy.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub model_id: String,
    pub output: ModelOutput,
    pub accuracy: f64,
}

impl RawPrediction {
    #[must_use]
    pub fn new(model_id: &str, output: ModelOutput, accuracy: f64) -> Self {
        Self {
            model_id: model_id.to_string(),
            output,
            accuracy,
        }
    }
}

pub struct PredictionAggregator;

impl PredictionAggregator {
    /// Builds the consensus candidate for `market`.
    ///
    /// The returned candidate is not yet qualified (`qualifies == false`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroWeight`] when every model weight is
    /// zero, including when `predictions` is empty.
    pub fn aggregate(
        market: MarketCandidate,
        predictions: Vec<RawPrediction>,
    ) -> Result<Candidate, ConfigurationError> {
        let weighted: Vec<(RawPrediction, f64, f64)> = predictions
            .into_iter()
            .map(|p| {
                let accuracy = unit(p.accuracy);
                let weight = accuracy * unit(p.output.confidence);
                (p, accuracy, weight)
            })
            .collect();

        let total_weight: f64 = weighted.iter().map(|(_, _, w)| w).sum();
        let total_accuracy: f64 = weighted.iter().map(|(_, a, _)| a).sum();
        if total_weight <= 0.0 || total_accuracy <= 0.0 {
            return Err(ConfigurationError::ZeroWeight {
                context: format!("candidate {}", market.key()),
            });
        }

        let consensus_prediction = weighted
            .iter()
            .map(|(p, _, w)| w * finite_or_zero(p.output.value))
            .sum::<f64>()
            / total_weight;

        let consensus_confidence = (weighted
            .iter()
            .map(|(p, a, _)| a * unit(p.output.confidence))
            .sum::<f64>()
            / total_accuracy)
            .clamp(0.0, 1.0);

        let dispersion = (weighted
            .iter()
            .map(|(p, _, w)| w * (finite_or_zero(p.output.value) - consensus_prediction).powi(2))
            .sum::<f64>()
            / total_weight)
            .sqrt();

        let side = Side::from_projection(consensus_prediction, market.line);
        // A price at or below 1.0 pays nothing; treat it as a certainty.
        let implied_probability =
            odds::implied_probability(market.odds.for_side(side)).unwrap_or(1.0);
        let edge = (consensus_confidence - implied_probability).abs();

        let risk_score = market.risk_score.map_or_else(
            || {
                let spread = (dispersion / market.line.abs().max(1.0)).min(1.0);
                0.5 * (1.0 - consensus_confidence) + 0.5 * spread
            },
            unit,
        );

        let predictions = weighted
            .into_iter()
            .map(|(p, accuracy, weight)| ModelPrediction {
                model_id: p.model_id,
                value: p.output.value,
                confidence: p.output.confidence,
                accuracy,
                weight_share: weight / total_weight,
            })
            .collect();

        Ok(Candidate {
            market,
            predictions,
            consensus_prediction,
            consensus_confidence,
            side,
            implied_probability,
            edge,
            risk_score,
            qualifies: false,
        })
    }
}

/// Clamps to [0, 1]; non-finite values count as zero.
fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
