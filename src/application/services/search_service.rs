use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    application::dtos::{HealthStatusResponse, SearchRequest, SearchResponse, SearchResultDto},
    domain::{Dataset, DatasetSummary, DomainError, QaEntry, QueryContext, RankingOptions, Record},
};

use super::ranker::RelevanceRanker;

const MAX_QUERY_CHARS: usize = 1_000;
const MAX_TOP_K: usize = 50;

/// Queries shorter than this (after trimming) return no results.
pub const DEFAULT_MIN_QUERY_CHARS: usize = 4;

/// High level configuration shared by the service and its adapters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub embedding_model: String,
    pub ranking: RankingOptions,
    pub min_query_chars: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embedding_model: "tanya/simple-hash".into(),
            ranking: RankingOptions::default(),
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
        }
    }
}

impl ServiceConfig {
    pub fn new(
        embedding_model: impl Into<String>,
        ranking: RankingOptions,
        min_query_chars: usize,
    ) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            ranking: RankingOptions::new(ranking.min_score, ranking.top_k.clamp(1, MAX_TOP_K)),
            min_query_chars,
        }
    }

    pub fn with_model(embedding_model: impl Into<String>) -> Self {
        let defaults = Self::default();
        Self::new(embedding_model, defaults.ranking, defaults.min_query_chars)
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

/// Abstraction over any embedding engine (remote inference API, local model, hash fallback).
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    fn dims(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// Contract for whatever owns the loaded Q&A table.
pub trait RecordSource: Send + Sync {
    /// The current immutable snapshot. Searches hold it for their whole run.
    fn snapshot(&self) -> Arc<Dataset>;

    /// Re-read the table from its origin and swap it in.
    fn reload(&self) -> Result<DatasetSummary, DomainError>;

    fn ping(&self) -> Result<(), DomainError>;
}

/// The orchestrator responsible for validation, query embedding and ranking.
pub struct SearchService {
    embedder: Arc<dyn EmbeddingEngine>,
    source: Arc<dyn RecordSource>,
    config: ServiceConfig,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn EmbeddingEngine>,
        source: Arc<dyn RecordSource>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            embedder,
            source,
            config,
        }
    }

    pub fn search(&self, request: SearchRequest) -> Result<SearchResponse, DomainError> {
        let query = request.query.trim().to_string();
        if query.is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }
        let query_chars = query.chars().count();
        if query_chars > MAX_QUERY_CHARS {
            return Err(DomainError::limit(format!(
                "query cannot exceed {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let options = self.resolve_options(request.min_score, request.top_k)?;

        if query_chars < self.config.min_query_chars {
            debug!(
                target: "tanya::search",
                chars = query_chars,
                minimum = self.config.min_query_chars,
                "query too short; skipping search"
            );
            return Ok(SearchResponse::empty(query));
        }

        let dataset = self.source.snapshot();
        if dataset.is_empty() {
            debug!(target: "tanya::search", "dataset is empty; nothing to rank");
            return Ok(SearchResponse::empty(query));
        }

        let context = self.query_context(&query, &dataset)?;
        let groups = RelevanceRanker::new(options).rank(&context, dataset.records())?;

        let results = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| SearchResultDto {
                rank: index + 1,
                question: group.question,
                answers: group.answers,
                score: group.score,
            })
            .collect();

        Ok(SearchResponse {
            degraded: context.is_degraded(),
            query,
            results,
        })
    }

    /// Embed a raw Q&A table into records, one per answer.
    pub fn embed_dataset(&self, entries: Vec<QaEntry>) -> Result<Vec<Record>, DomainError> {
        let mut records = Vec::with_capacity(entries.len());
        let mut dimensions: Option<usize> = None;

        for (index, entry) in entries.into_iter().enumerate() {
            let question = entry.question.trim().to_string();
            if question.is_empty() {
                return Err(DomainError::validation(format!(
                    "entry {index} has an empty question"
                )));
            }

            let answers: Vec<String> = entry
                .answer
                .into_answers()
                .into_iter()
                .filter(|answer| !answer.trim().is_empty())
                .collect();
            if answers.is_empty() {
                return Err(DomainError::validation(format!(
                    "entry {index} (`{question}`) has no answers"
                )));
            }

            let vector = self
                .embedder
                .embed(&self.config.embedding_model, &question)?;
            match dimensions {
                Some(expected) if expected != vector.len() => {
                    return Err(DomainError::dimension_mismatch(expected, vector.len()));
                }
                None => dimensions = Some(vector.len()),
                _ => {}
            }

            for answer in answers {
                records.push(Record::new(question.clone(), answer, vector.clone()));
            }
        }

        info!(
            target: "tanya::search",
            records = records.len(),
            model = %self.config.embedding_model,
            "embedded dataset"
        );

        Ok(records)
    }

    pub fn dataset_info(&self) -> DatasetSummary {
        self.source.snapshot().summary()
    }

    pub fn reload_dataset(&self) -> Result<DatasetSummary, DomainError> {
        self.source.reload()
    }

    pub fn embedding_dimensions(&self) -> Option<usize> {
        self.embedder.dims(self.config.embedding_model())
    }

    pub fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.source.ping()?;

        let dataset = self.source.snapshot();
        let message = if dataset.is_empty() {
            "ready (dataset empty)"
        } else {
            "ready"
        };

        let status = HealthStatusResponse {
            ok: true,
            message: message.into(),
            details: Some(format!(
                "model: {}, records: {}, checked_at: {}",
                self.config.embedding_model,
                dataset.len(),
                Utc::now()
            )),
        };

        Ok(status)
    }

    fn resolve_options(
        &self,
        min_score: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<RankingOptions, DomainError> {
        let min_score = min_score.unwrap_or(self.config.ranking.min_score);
        if !min_score.is_finite() {
            return Err(DomainError::validation("min_score must be a finite number"));
        }
        let top_k = top_k
            .unwrap_or(self.config.ranking.top_k)
            .clamp(1, MAX_TOP_K);

        Ok(RankingOptions::new(min_score, top_k))
    }

    /// Embed the query, degrading to keyword-only scoring when the provider fails.
    fn query_context(&self, query: &str, dataset: &Dataset) -> Result<QueryContext, DomainError> {
        match self.embedder.embed(&self.config.embedding_model, query) {
            Ok(vector) => {
                if let Some(expected) = dataset.dimensions() {
                    if vector.len() != expected {
                        return Err(DomainError::dimension_mismatch(expected, vector.len()));
                    }
                }
                Ok(QueryContext::semantic(query, vector))
            }
            Err(err) => {
                warn!(
                    target: "tanya::search",
                    error = %err,
                    "query embedding unavailable; falling back to keyword scoring"
                );
                Ok(QueryContext::lexical(query))
            }
        }
    }
}
