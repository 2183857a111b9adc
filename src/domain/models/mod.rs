use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
#[cfg(feature = "mcp-server")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Records scoring below this are dropped before grouping.
pub const DEFAULT_MIN_SCORE: f32 = 0.25;

/// Upper bound on the number of groups returned by a ranking call.
pub const DEFAULT_TOP_K: usize = 10;

/// One answer to one question, with the question's precomputed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

impl Record {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            embedding,
        }
    }

    pub fn dims(&self) -> usize {
        self.embedding.len()
    }

    /// Key used to merge records that answer the same question.
    pub fn group_key(&self) -> &str {
        self.question.trim()
    }
}

/// The query as seen by the ranker.
///
/// `embedding` is `None` when the embedding provider failed or was skipped;
/// ranking then falls back to lexical signals only.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

impl QueryContext {
    pub fn semantic(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding: Some(embedding),
        }
    }

    pub fn lexical(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.embedding.is_none()
    }
}

/// A question with every answer that survived filtering, ranked by its best answer.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredGroup {
    pub question: String,
    pub answers: Vec<String>,
    pub score: f32,
}

/// Tunables with a recognised effect on ranking output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingOptions {
    pub min_score: f32,
    pub top_k: usize,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RankingOptions {
    pub fn new(min_score: f32, top_k: usize) -> Self {
        Self { min_score, top_k }
    }
}

/// Per-record score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordScore {
    pub similarity: f32,
    pub keyword: f32,
    pub total: f32,
}

/// Answer column of a Q&A table entry: a single string or a list.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerField {
    One(String),
    Many(Vec<String>),
}

impl AnswerField {
    pub fn into_answers(self) -> Vec<String> {
        match self {
            AnswerField::One(answer) => vec![answer],
            AnswerField::Many(answers) => answers,
        }
    }
}

/// One row of a Q&A table as it appears on disk. Raw tables omit `embedding`.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: AnswerField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Where a dataset snapshot was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "kebab-case")]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
    Inline,
}

impl DatasetSource {
    /// Interpret a user-supplied location: `http(s)://` prefixes are URLs, anything else a path.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("dataset location cannot be empty"));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(DatasetSource::Url(trimmed.to_string()))
        } else {
            Ok(DatasetSource::File(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Url(url) => f.write_str(url),
            DatasetSource::Inline => f.write_str("inline"),
        }
    }
}

/// Immutable snapshot of a loaded Q&A table.
///
/// Every record shares the same embedding length; construction rejects
/// ragged or empty embeddings so ranking never compares vectors of
/// different sizes from within one table.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    dimensions: Option<usize>,
    source: DatasetSource,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(records: Vec<Record>, source: DatasetSource) -> Result<Self, DomainError> {
        let dimensions = records.first().map(Record::dims);

        if let Some(expected) = dimensions {
            for (index, record) in records.iter().enumerate() {
                if record.embedding.is_empty() {
                    return Err(DomainError::dataset(format!(
                        "record {index} (`{}`) has an empty embedding",
                        record.question
                    )));
                }
                if record.dims() != expected {
                    return Err(DomainError::dimension_mismatch(expected, record.dims()));
                }
            }
        }

        Ok(Self {
            records,
            dimensions,
            source,
            loaded_at: Utc::now(),
        })
    }

    pub fn empty(source: DatasetSource) -> Self {
        Self {
            records: Vec::new(),
            dimensions: None,
            source,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn distinct_questions(&self) -> usize {
        let mut seen = ahash::AHashSet::with_capacity(self.records.len());
        self.records
            .iter()
            .filter(|record| seen.insert(record.group_key()))
            .count()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            source: self.source.to_string(),
            records: self.len(),
            questions: self.distinct_questions(),
            dimensions: self.dimensions,
            loaded_at: self.loaded_at,
        }
    }
}

/// Lightweight projection describing the active dataset.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub source: String,
    pub records: usize,
    pub questions: usize,
    pub dimensions: Option<usize>,
    pub loaded_at: DateTime<Utc>,
}
