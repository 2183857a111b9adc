use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::services::{ServiceConfig, DEFAULT_MIN_QUERY_CHARS};
use crate::domain::{RankingOptions, DEFAULT_MIN_SCORE, DEFAULT_TOP_K};
use crate::infrastructure::embeddings::remote_engine::{DEFAULT_REMOTE_ENDPOINT, DEFAULT_REMOTE_MODEL};

/// Default filename used to persist configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

/// Declarative list of embedding backends compiled into the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Lightweight deterministic hash embedder (always available).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// HTTP feature-extraction endpoint. The API token is read from the
    /// environment variable named by `api_token_env`, never from this file.
    Remote {
        #[serde(default = "default_remote_endpoint")]
        endpoint: String,
        #[serde(default = "default_remote_model")]
        model: String,
        #[serde(default = "default_api_token_env")]
        api_token_env: String,
        #[serde(default = "default_remote_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        dimensions: Option<usize>,
    },
    /// No embeddings at all; every search is keyword-only.
    Disabled,
    /// Local semantic embeddings powered by FastEmbed (feature gated).
    #[cfg(feature = "fastembed-engine")]
    FastEmbed { model: String },
}

impl EmbeddingBackend {
    pub fn id(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "simple",
            EmbeddingBackend::Remote { .. } => "remote",
            EmbeddingBackend::Disabled => "disabled",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "Deterministic Hash (offline)",
            EmbeddingBackend::Remote { .. } => "Remote inference API",
            EmbeddingBackend::Disabled => "Keyword only",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "FastEmbed (local semantic)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => {
                "Token-hash vectors; tables must be embedded with the same backend."
            }
            EmbeddingBackend::Remote { .. } => {
                "Sentence embeddings from an HTTP feature-extraction endpoint; falls back to keywords when unreachable."
            }
            EmbeddingBackend::Disabled => "Skips embedding; ranks on substring and fuzzy matches.",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => {
                "Semantic embeddings computed locally via fastembed/ONNX runtime."
            }
        }
    }

    pub fn is_feature_gated(&self) -> bool {
        #[cfg(feature = "fastembed-engine")]
        {
            return matches!(self, EmbeddingBackend::FastEmbed { .. });
        }

        #[cfg(not(feature = "fastembed-engine"))]
        {
            false
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            EmbeddingBackend::Remote { model, .. } => model,
            EmbeddingBackend::Disabled => "disabled",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }

    pub fn expected_dimensions(&self) -> Option<usize> {
        match self {
            EmbeddingBackend::Simple { dimensions, .. } => Some(*dimensions),
            EmbeddingBackend::Remote { dimensions, .. } => *dimensions,
            EmbeddingBackend::Disabled => None,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => None,
        }
    }

    pub fn with_default_model(id: &str) -> Option<Self> {
        match id {
            "simple" => Some(EmbeddingBackend::Simple {
                model: default_simple_model(),
                dimensions: default_simple_dim(),
            }),
            "remote" => Some(default_remote_backend()),
            "disabled" => Some(EmbeddingBackend::Disabled),
            #[cfg(feature = "fastembed-engine")]
            "fastembed" => Some(EmbeddingBackend::FastEmbed {
                model: default_fastembed_model(),
            }),
            _ => None,
        }
    }

    /// Replace the model name, where the backend has one.
    pub fn with_model_override(mut self, model_override: Option<String>) -> Self {
        if let Some(model) = model_override.and_then(|m| {
            let trimmed = m.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }) {
            match &mut self {
                EmbeddingBackend::Simple {
                    model: backend_model,
                    ..
                }
                | EmbeddingBackend::Remote {
                    model: backend_model,
                    ..
                } => *backend_model = model,
                EmbeddingBackend::Disabled => {}
                #[cfg(feature = "fastembed-engine")]
                EmbeddingBackend::FastEmbed {
                    model: backend_model,
                } => *backend_model = model,
            }
        }
        self
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        #[cfg(feature = "fastembed-engine")]
        {
            EmbeddingBackend::FastEmbed {
                model: default_fastembed_model(),
            }
        }
        #[cfg(not(feature = "fastembed-engine"))]
        {
            default_remote_backend()
        }
    }
}

/// Score threshold, result bound and the minimum query length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            top_k: default_top_k(),
            min_query_chars: default_min_query_chars(),
        }
    }
}

impl RankingConfig {
    pub fn options(&self) -> RankingOptions {
        RankingOptions::new(self.min_score, self.top_k)
    }

    pub fn service_config(&self, embedding_model: impl Into<String>) -> ServiceConfig {
        ServiceConfig::new(embedding_model, self.options(), self.min_query_chars)
    }
}

/// Where the Q&A table comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetConfig {
    /// File path or http(s) URL. `None` starts with an empty table.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl DatasetConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Complete persisted configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingBackend,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// Thread-safe manager responsible for loading and persisting `AppConfig`.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Create a manager rooted at `data_dir`. The JSON file will be located at
    /// `<data_dir>/config.json`. A missing or unreadable file yields defaults.
    pub fn load(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice::<AppConfig>(&bytes).unwrap_or_else(|err| {
                warn!(
                    target: "tanya::settings",
                    path = %path.display(),
                    error = %err,
                    "ignoring unreadable config file"
                );
                AppConfig::default()
            })
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    /// Update the active embedding backend and persist to disk.
    pub fn set_backend(&self, backend: EmbeddingBackend) -> std::io::Result<AppConfig> {
        self.update(|config| config.embedding = backend)
    }

    /// Point at a different dataset location and persist to disk.
    pub fn set_dataset_source(&self, source: Option<String>) -> std::io::Result<AppConfig> {
        self.update(|config| config.dataset.source = source)
    }

    fn update(&self, apply: impl FnOnce(&mut AppConfig)) -> std::io::Result<AppConfig> {
        let mut guard = self.state.write();
        apply(&mut *guard);
        self.persist_locked(&guard)?;
        Ok(guard.clone())
    }

    /// Ensure the backing directory exists and write the JSON payload.
    fn persist_locked(&self, config: &AppConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        fs::write(&self.path, payload)
    }
}

pub fn available_backends() -> Vec<EmbeddingBackend> {
    let mut backends = Vec::new();
    #[cfg(feature = "fastembed-engine")]
    backends.push(EmbeddingBackend::FastEmbed {
        model: default_fastembed_model(),
    });
    backends.push(default_remote_backend());
    backends.push(EmbeddingBackend::Simple {
        model: default_simple_model(),
        dimensions: default_simple_dim(),
    });
    backends.push(EmbeddingBackend::Disabled);
    backends
}

fn default_remote_backend() -> EmbeddingBackend {
    EmbeddingBackend::Remote {
        endpoint: default_remote_endpoint(),
        model: default_remote_model(),
        api_token_env: default_api_token_env(),
        timeout_secs: default_remote_timeout_secs(),
        dimensions: None,
    }
}

const fn default_simple_dim() -> usize {
    256
}

fn default_simple_model() -> String {
    "tanya/simple-hash".to_string()
}

fn default_remote_endpoint() -> String {
    DEFAULT_REMOTE_ENDPOINT.to_string()
}

fn default_remote_model() -> String {
    DEFAULT_REMOTE_MODEL.to_string()
}

fn default_api_token_env() -> String {
    "HF_API_TOKEN".to_string()
}

const fn default_remote_timeout_secs() -> u64 {
    10
}

const fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}

const fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

const fn default_min_query_chars() -> usize {
    DEFAULT_MIN_QUERY_CHARS
}

const fn default_fetch_timeout_secs() -> u64 {
    30
}

#[cfg(feature = "fastembed-engine")]
fn default_fastembed_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::load(dir.path()).unwrap();
        let config = manager.current();

        assert_eq!(config.ranking, RankingConfig::default());
        assert_eq!(config.ranking.min_score, 0.25);
        assert_eq!(config.ranking.top_k, 10);
        assert_eq!(config.ranking.min_query_chars, 4);
        assert!(config.dataset.source.is_none());
    }

    #[test]
    fn updates_are_persisted() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::load(dir.path()).unwrap();

        manager.set_backend(EmbeddingBackend::Disabled).unwrap();
        manager
            .set_dataset_source(Some("data/rfp.json".into()))
            .unwrap();

        let reloaded = ConfigManager::load(dir.path()).unwrap().current();
        assert_eq!(reloaded.embedding, EmbeddingBackend::Disabled);
        assert_eq!(reloaded.dataset.source.as_deref(), Some("data/rfp.json"));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{ nope").unwrap();

        let config = ConfigManager::load(dir.path()).unwrap().current();
        assert_eq!(config.ranking, RankingConfig::default());
    }

    #[test]
    fn partial_backend_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"embedding":{"backend":"remote","timeout_secs":3},"ranking":{"top_k":5}}"#,
        )
        .unwrap();

        match config.embedding {
            EmbeddingBackend::Remote {
                model,
                timeout_secs,
                api_token_env,
                ..
            } => {
                assert_eq!(model, DEFAULT_REMOTE_MODEL);
                assert_eq!(timeout_secs, 3);
                assert_eq!(api_token_env, "HF_API_TOKEN");
            }
            other => panic!("unexpected backend {other:?}"),
        }
        assert_eq!(config.ranking.top_k, 5);
        assert_eq!(config.ranking.min_score, 0.25);
    }

    #[test]
    fn model_override_ignores_blank_values() {
        let backend = EmbeddingBackend::with_default_model("simple")
            .unwrap()
            .with_model_override(Some("  ".into()));
        assert_eq!(backend.model_name(), "tanya/simple-hash");

        let backend = backend.with_model_override(Some(" custom/hash ".into()));
        assert_eq!(backend.model_name(), "custom/hash");
        assert!(EmbeddingBackend::with_default_model("unknown").is_none());
    }
}
