use ahash::RandomState;

use crate::{application::services::EmbeddingEngine, domain::DomainError};

use super::ensure_request;

// Fixed seeds keep vectors identical across processes, so a table embedded
// by one run can be searched by another.
const SEEDS: [u64; 4] = [
    0x7461_6e79_615f_6861,
    0x7368_5f65_6d62_6564,
    0x0123_4567_89ab_cdef,
    0xfedc_ba98_7654_3210,
];

/// A lightweight, deterministic embedding engine that hashes lower-cased
/// tokens into a fixed-size vector. Not a semantic model, but it lets a table
/// be embedded and searched fully offline.
pub struct SimpleEmbedEngine {
    model_name: String,
    dimensions: usize,
    hasher: RandomState,
}

impl SimpleEmbedEngine {
    pub fn try_new(model_name: impl Into<String>, dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::validation(
                "embedding dimensions must be greater than zero",
            ));
        }
        Ok(Self {
            model_name: model_name.into(),
            dimensions: dimensions.clamp(8, 4096),
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        })
    }

    fn embed_internal(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let tokens = text
            .split(|c: char| c.is_ascii_whitespace() || c.is_ascii_punctuation())
            .filter(|token| !token.is_empty());
        for token in tokens {
            let hash = self.hasher.hash_one(token.to_lowercase());
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }

        // L2 normalize to keep scores in [-1, 1]
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl EmbeddingEngine for SimpleEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        ensure_request(&self.model_name, model, text)?;
        Ok(self.embed_internal(text))
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}
