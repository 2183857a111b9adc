//! Embedding engine for keyword-only deployments.
//!
//! Every call fails, which the search service treats as an unavailable
//! embedding and answers from keyword and fuzzy matching alone.

use crate::{application::services::EmbeddingEngine, domain::DomainError};

pub struct DisabledEmbedEngine {
    model_name: String,
}

impl DisabledEmbedEngine {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }
}

impl Default for DisabledEmbedEngine {
    fn default() -> Self {
        Self::new("disabled")
    }
}

impl EmbeddingEngine for DisabledEmbedEngine {
    fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>, DomainError> {
        Err(DomainError::embedding(format!(
            "embeddings are disabled (`{}`); ranking uses keywords only",
            self.model_name
        )))
    }
}
