//! Lookup of prediction models by configured id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::traits::PredictionModel;

#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn PredictionModel>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model under its own id, replacing any previous model
    /// with the same id.
    pub fn register(&mut self, model: Arc<dyn PredictionModel>) {
        let id = model.id().to_string();
        tracing::debug!("Registered model {}", id);
        self.models.insert(id, model);
    }

    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn PredictionModel>) -> Self {
        self.register(model);
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn PredictionModel>> {
        self.models.get(id).cloned()
    }

    /// Registered ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Resolves configured ids, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyModelSet`] for an empty list and
    /// [`ConfigurationError::MissingModel`] naming the first unknown id.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<dyn PredictionModel>>, ConfigurationError> {
        if ids.is_empty() {
            return Err(ConfigurationError::EmptyModelSet);
        }
        ids.iter()
            .map(|id| {
                self.get(id).ok_or_else(|| ConfigurationError::MissingModel {
                    model_id: id.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.ids())
            .finish()
    }
}
