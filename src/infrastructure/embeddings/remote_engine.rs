//! Embedding engine backed by a remote feature-extraction endpoint.
//!
//! Sends the text as a JSON string body and accepts either a flat vector or a
//! batch-shaped `[[...]]` response (first row wins), which covers the Hugging
//! Face inference pipeline and most self-hosted embedding servers.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{
    application::services::EmbeddingEngine,
    domain::DomainError,
    infrastructure::http_client::{build_agent, describe_http_error},
};

use super::ensure_request;

pub const DEFAULT_REMOTE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RemoteEngineConfig {
    pub endpoint: String,
    pub model: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    /// When set, responses of any other length are rejected.
    pub dimensions: Option<usize>,
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REMOTE_ENDPOINT.into(),
            model: DEFAULT_REMOTE_MODEL.into(),
            api_token: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            dimensions: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingPayload {
    Flat(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

pub struct RemoteEmbedEngine {
    config: RemoteEngineConfig,
    agent: ureq::Agent,
}

impl RemoteEmbedEngine {
    pub fn try_new(config: RemoteEngineConfig) -> Result<Self, DomainError> {
        let endpoint = config.endpoint.trim().to_ascii_lowercase();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(DomainError::validation(format!(
                "embedding endpoint must be an http(s) URL, got `{}`",
                config.endpoint
            )));
        }
        if config.model.trim().is_empty() {
            return Err(DomainError::validation("remote model name cannot be empty"));
        }

        let agent = build_agent(config.timeout);
        Ok(Self { config, agent })
    }
}

impl EmbeddingEngine for RemoteEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        ensure_request(&self.config.model, model, text)?;

        let mut request = self
            .agent
            .post(&self.config.endpoint)
            .set("Accept", "application/json");
        if let Some(token) = &self.config.api_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request
            .send_json(serde_json::Value::String(text.to_string()))
            .map_err(|err| DomainError::embedding(describe_http_error(err)))?;

        let payload: EmbeddingPayload = response.into_json().map_err(|err| {
            DomainError::embedding(format!("failed to parse embedding response: {err}"))
        })?;

        let vector = extract_vector(payload)?;
        if let Some(expected) = self.config.dimensions {
            if vector.len() != expected {
                return Err(DomainError::dimension_mismatch(expected, vector.len()));
            }
        }

        debug!(
            target: "tanya::embeddings",
            endpoint = %self.config.endpoint,
            dims = vector.len(),
            "remote embedding received"
        );

        Ok(vector)
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        self.config.dimensions
    }
}

fn extract_vector(payload: EmbeddingPayload) -> Result<Vec<f32>, DomainError> {
    let vector = match payload {
        EmbeddingPayload::Flat(vector) => vector,
        EmbeddingPayload::Batch(rows) => rows
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("embedding response contained no rows"))?,
    };

    if vector.is_empty() {
        return Err(DomainError::embedding("embedding response was empty"));
    }
    if vector.iter().any(|value| !value.is_finite()) {
        return Err(DomainError::embedding(
            "embedding response contained non-finite values",
        ));
    }

    Ok(vector)
}
