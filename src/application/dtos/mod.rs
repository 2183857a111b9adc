#[cfg(feature = "mcp-server")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DTO bridging search surfaces (CLI, MCP, HTTP) and the application layer.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Overrides the configured score threshold for this call.
    #[serde(default)]
    pub min_score: Option<f32>,
    /// Overrides the configured result bound for this call.
    #[serde(default, alias = "limit")]
    pub top_k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            min_score: None,
            top_k: None,
        }
    }
}

/// One ranked question with every answer that matched.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultDto {
    pub rank: usize,
    pub question: String,
    pub answers: Vec<String>,
    pub score: f32,
}

/// Response envelope for search operations.
///
/// `degraded` is set when the query could not be embedded and results were
/// ranked on keyword signals alone.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub degraded: bool,
    pub results: Vec<SearchResultDto>,
}

impl SearchResponse {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            degraded: false,
            results: Vec::new(),
        }
    }
}

/// Health/readiness report for diagnostics.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}

#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingBackendOption {
    pub id: String,
    pub label: String,
    pub description: String,
    pub model: String,
    pub dimensions: Option<usize>,
    pub feature_gated: bool,
}

#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingBackendListResponse {
    pub active: String,
    pub options: Vec<EmbeddingBackendOption>,
}

/// Arguments for tools that take no input.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyArgs {}
