//! Service layer orchestrating ranking and infrastructure adapters.

pub mod ranker;
mod search_service;

pub use ranker::{keyword_score, rank, RelevanceRanker};
pub use search_service::{
    EmbeddingEngine, RecordSource, SearchService, ServiceConfig, DEFAULT_MIN_QUERY_CHARS,
};
