//! Recorded slates with per-model predictions, loaded from JSON or CSV.
//!
//! A dataset replays a past season: it yields both the data provider
//! (candidates and realized values) and a registry of recorded models that
//! return the predictions captured at the time.
//!
//! CSV layout, one row per candidate and model:
//!
//! ```text
//! date,id,event_id,player,prop_type,line,over_odds,under_odds,closing_over,closing_under,risk_score,realized,model_id,model_value,model_confidence,model_accuracy
//! ```

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use betlab_core::{MarketCandidate, ModelOutput, ModelRegistry, PostedOdds, PredictionModel};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data_provider::InMemoryProvider;

/// Model metadata in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedModelInfo {
    pub id: String,
    pub accuracy: f64,
}

/// A candidate with its realized value and recorded model outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCandidate {
    #[serde(flatten)]
    pub market: MarketCandidate,
    #[serde(default)]
    pub realized: Option<f64>,
    #[serde(default)]
    pub predictions: BTreeMap<String, ModelOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedDataset {
    pub models: Vec<RecordedModelInfo>,
    pub candidates: Vec<RecordedCandidate>,
}

/// Flat CSV row.
#[derive(Debug, Deserialize)]
struct SlateRow {
    date: NaiveDate,
    id: String,
    event_id: String,
    player: String,
    prop_type: String,
    line: f64,
    over_odds: Decimal,
    under_odds: Decimal,
    closing_over: Option<Decimal>,
    closing_under: Option<Decimal>,
    risk_score: Option<f64>,
    realized: Option<f64>,
    model_id: String,
    model_value: f64,
    model_confidence: f64,
    model_accuracy: f64,
}

impl RecordedDataset {
    /// Loads a dataset, choosing the format from the file extension
    /// (`.csv`, otherwise JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let dataset = if is_csv {
            Self::from_csv_path(path)?
        } else {
            Self::from_json_path(path)?
        };
        tracing::info!(
            "Loaded {} candidates and {} models from {}",
            dataset.candidates.len(),
            dataset.models.len(),
            path.display()
        );
        Ok(dataset)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid dataset.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns an error if `json` is not a valid dataset.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dataset: Self = serde_json::from_str(json)?;
        dataset.check()?;
        Ok(dataset)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a row is malformed.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open dataset {}", path.display()))?;
        Self::from_csv_reader(file).with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Reads flat CSV rows, merging rows that share a date and candidate id.
    ///
    /// # Errors
    ///
    /// Returns an error if a row is malformed.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut accuracies: BTreeMap<String, f64> = BTreeMap::new();
        let mut candidates: BTreeMap<(NaiveDate, String), RecordedCandidate> = BTreeMap::new();

        for (line, row) in reader.deserialize::<SlateRow>().enumerate() {
            // +2: header row and 1-based numbering
            let row = row.with_context(|| format!("Invalid row at line {}", line + 2))?;
            accuracies.insert(row.model_id.clone(), row.model_accuracy);

            let closing_odds = match (row.closing_over, row.closing_under) {
                (Some(over), Some(under)) => Some(PostedOdds { over, under }),
                (Some(price), None) | (None, Some(price)) => Some(PostedOdds::even(price)),
                (None, None) => None,
            };
            let entry = candidates
                .entry((row.date, row.id.clone()))
                .or_insert_with(|| RecordedCandidate {
                    market: MarketCandidate {
                        id: row.id.clone(),
                        date: row.date,
                        event_id: row.event_id.clone(),
                        player: row.player.clone(),
                        prop_type: row.prop_type.clone(),
                        line: row.line,
                        odds: PostedOdds {
                            over: row.over_odds,
                            under: row.under_odds,
                        },
                        closing_odds,
                        risk_score: row.risk_score,
                    },
                    realized: row.realized,
                    predictions: BTreeMap::new(),
                });
            entry.predictions.insert(
                row.model_id,
                ModelOutput {
                    value: row.model_value,
                    confidence: row.model_confidence,
                },
            );
        }

        let dataset = Self {
            models: accuracies
                .into_iter()
                .map(|(id, accuracy)| RecordedModelInfo { id, accuracy })
                .collect(),
            candidates: candidates.into_values().collect(),
        };
        dataset.check()?;
        Ok(dataset)
    }

    /// Rejects predictions from models the dataset does not declare.
    fn check(&self) -> Result<()> {
        for candidate in &self.candidates {
            for model_id in candidate.predictions.keys() {
                if !self.models.iter().any(|m| &m.id == model_id) {
                    bail!(
                        "candidate {} has a prediction from undeclared model '{}'",
                        candidate.market.key(),
                        model_id
                    );
                }
            }
        }
        Ok(())
    }

    /// Data provider over the recorded slates and outcomes.
    #[must_use]
    pub fn provider(&self) -> InMemoryProvider {
        self.candidates
            .iter()
            .fold(InMemoryProvider::new(), |provider, c| {
                provider.with_candidate(c.market.clone(), c.realized)
            })
    }

    /// Registry holding one [`RecordedModel`] per declared model.
    #[must_use]
    pub fn registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for info in &self.models {
            let outputs = self
                .candidates
                .iter()
                .filter_map(|c| c.predictions.get(&info.id).map(|o| (c.market.key(), *o)))
                .collect();
            registry.register(Arc::new(RecordedModel {
                id: info.id.clone(),
                accuracy: info.accuracy,
                outputs,
            }));
        }
        registry
    }

    #[must_use]
    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.id.clone()).collect()
    }
}

/// Replays predictions captured for each candidate.
#[derive(Debug, Clone)]
pub struct RecordedModel {
    id: String,
    accuracy: f64,
    outputs: HashMap<String, ModelOutput>,
}

impl RecordedModel {
    #[must_use]
    pub fn new(id: &str, accuracy: f64) -> Self {
        Self {
            id: id.to_string(),
            accuracy,
            outputs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, candidate: &MarketCandidate, output: ModelOutput) -> Self {
        self.outputs.insert(candidate.key(), output);
        self
    }
}

#[async_trait]
impl PredictionModel for RecordedModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn historical_accuracy(&self) -> f64 {
        self.accuracy
    }

    async fn predict(&self, candidate: &MarketCandidate) -> Result<ModelOutput> {
        self.outputs
            .get(&candidate.key())
            .copied()
            .ok_or_else(|| anyhow!("model {} has no prediction for {}", self.id, candidate.key()))
    }
}
