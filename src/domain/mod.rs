//! Domain layer: core entities, value objects and similarity math for Tanya.

pub mod errors;
pub mod models;
pub mod similarity;

pub use errors::DomainError;
pub use models::{
    AnswerField, Dataset, DatasetSource, DatasetSummary, QaEntry, QueryContext, RankingOptions,
    Record, RecordScore, ScoredGroup, DEFAULT_MIN_SCORE, DEFAULT_TOP_K,
};
