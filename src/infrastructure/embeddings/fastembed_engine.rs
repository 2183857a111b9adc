use std::str::FromStr;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use parking_lot::Mutex;

use crate::{application::services::EmbeddingEngine, domain::DomainError};

use super::ensure_request;

/// Local ONNX embedding engine backed by `fastembed`.
///
/// Lets a deployment embed queries without any network call; the model is
/// loaded once and reused behind a `Mutex`.
pub struct FastEmbedEngine {
    model_label: String,
    dimensions: usize,
    inner: Mutex<TextEmbedding>,
}

impl FastEmbedEngine {
    /// Load the given model (for example `sentence-transformers/all-MiniLM-L6-v2`).
    pub fn try_new(model_name: impl AsRef<str>) -> Result<Self, DomainError> {
        let label = model_name.as_ref().trim();
        if label.is_empty() {
            return Err(DomainError::validation(
                "fastembed model name cannot be empty",
            ));
        }

        let model = EmbeddingModel::from_str(label)
            .map_err(|err| DomainError::embedding(format!("unknown fastembed model `{label}`: {err}")))?;
        let dimensions = TextEmbedding::get_model_info(&model)
            .map_err(|err| DomainError::embedding(format!("no metadata for `{label}`: {err}")))?
            .dim;
        let inner = TextEmbedding::try_new(TextInitOptions::new(model))
            .map_err(|err| DomainError::embedding(format!("failed to load `{label}`: {err}")))?;

        Ok(Self {
            model_label: label.to_string(),
            dimensions,
            inner: Mutex::new(inner),
        })
    }
}

impl EmbeddingEngine for FastEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        ensure_request(&self.model_label, model, text)?;

        let vector = self
            .inner
            .lock()
            .embed(vec![text], None)
            .map_err(|err| DomainError::embedding(format!("fastembed inference failed: {err}")))?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("fastembed returned no embedding"))?;

        if vector.len() != self.dimensions {
            return Err(DomainError::dimension_mismatch(self.dimensions, vector.len()));
        }

        Ok(vector)
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}
