use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(feature = "mcp-server")]
pub mod interfaces;
pub mod settings;

use application::services::{EmbeddingEngine, RecordSource};
use application::{EmbeddingBackendListResponse, EmbeddingBackendOption, SearchService};
use domain::{DatasetSource, DatasetSummary};
#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{
    DatasetStore, DisabledEmbedEngine, RemoteEmbedEngine, RemoteEngineConfig, SimpleEmbedEngine,
};

#[cfg(feature = "mcp-server")]
use interfaces::mcp::{McpRuntime, McpServerConfig};

use settings::{available_backends, AppConfig, ConfigManager, EmbeddingBackend};

const ENV_DATA_DIR: &str = "TANYA_DATA_DIR";
const ENV_DATASET: &str = "TANYA_DATASET";
const ENV_LOG: &str = "TANYA_LOG";

/// Shared, swappable handle to the active service.
pub type ServiceCell = Arc<RwLock<Arc<SearchService>>>;

pub struct AppHandles {
    pub service: Arc<SearchService>,
    pub dataset: Arc<DatasetStore>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

impl AppHandles {
    pub fn service_cell(&self) -> ServiceCell {
        Arc::new(RwLock::new(Arc::clone(&self.service)))
    }
}

/// How the bootstrap should treat the Q&A table.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentOptions {
    /// Location that wins over `TANYA_DATASET` and the config file.
    pub dataset: Option<String>,
    /// Start with an empty table regardless of configuration.
    pub skip_dataset: bool,
}

/// Install the global subscriber once; filter comes from `TANYA_LOG`.
pub fn init_tracing() {
    init_tracing_with_writer(std::io::stderr);
}

fn init_tracing_with_writer<W>(make_writer: fn() -> W)
where
    W: std::io::Write + Send + Sync + 'static,
{
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(make_writer)
            .compact()
            .try_init();
    });
}

pub fn build_environment() -> Result<AppHandles> {
    build_environment_with(EnvironmentOptions::default())
}

pub fn build_environment_with(options: EnvironmentOptions) -> Result<AppHandles> {
    let data_dir = resolve_data_dir()?;

    let config = Arc::new(ConfigManager::load(&data_dir).context("failed to load config file")?);
    let active_config = config.current();

    let dataset = if options.skip_dataset {
        Arc::new(DatasetStore::empty())
    } else {
        Arc::new(open_dataset(options.dataset, &active_config)?)
    };

    let service = build_service(&active_config, Arc::clone(&dataset) as Arc<dyn RecordSource>)
        .context("failed to initialise embedding backend")?;

    Ok(AppHandles {
        service,
        dataset,
        config,
        data_dir,
    })
}

/// Wire the configured embedding backend and ranking settings around `source`.
pub fn build_service(config: &AppConfig, source: Arc<dyn RecordSource>) -> Result<Arc<SearchService>> {
    let (embedder, model) = init_embedder(&config.embedding)?;
    Ok(Arc::new(SearchService::new(
        embedder,
        source,
        config.ranking.service_config(model),
    )))
}

/// Switch the embedding backend, persist the choice, and swap the live service.
pub fn switch_backend(
    cell: &ServiceCell,
    config: &ConfigManager,
    source: Arc<dyn RecordSource>,
    backend_id: &str,
    model_override: Option<String>,
) -> Result<EmbeddingBackendListResponse> {
    let backend = EmbeddingBackend::with_default_model(backend_id)
        .ok_or_else(|| anyhow!("unknown backend '{}'", backend_id))?
        .with_model_override(model_override);

    let mut next_config = config.current();
    next_config.embedding = backend.clone();
    let new_service = build_service(&next_config, source)?;

    let updated = config
        .set_backend(backend)
        .context("failed to persist backend choice")?;

    {
        let mut guard = cell.write();
        *guard = Arc::clone(&new_service);
    }

    info!(target: "tanya::settings", backend = backend_id, "embedding backend switched");
    Ok(build_backend_response(updated.embedding, &new_service))
}

/// Check that `location` loads, then persist it as the default dataset.
pub fn remember_dataset(config: &ConfigManager, location: &str) -> Result<DatasetSummary> {
    let location = location.trim();
    let source = DatasetSource::parse(location)?;
    let store = DatasetStore::open(source, config.current().dataset.fetch_timeout())
        .with_context(|| format!("failed to load dataset from {location}"))?;

    config
        .set_dataset_source(Some(location.to_string()))
        .context("failed to persist dataset choice")?;

    info!(
        target: "tanya::settings",
        source = %store.origin(),
        path = %config.path().display(),
        "default dataset updated"
    );
    Ok(store.snapshot().summary())
}

pub fn build_backend_response(
    active: EmbeddingBackend,
    service: &SearchService,
) -> EmbeddingBackendListResponse {
    let mut options: Vec<EmbeddingBackendOption> = available_backends()
        .into_iter()
        .map(|backend| EmbeddingBackendOption {
            id: backend.id().to_string(),
            label: backend.label().to_string(),
            description: backend.description().to_string(),
            model: backend.model_name().to_string(),
            dimensions: backend.expected_dimensions(),
            feature_gated: backend.is_feature_gated(),
        })
        .collect();

    if let Some(option) = options.iter_mut().find(|opt| opt.id == active.id()) {
        option.model = active.model_name().to_string();
        option.dimensions = service
            .embedding_dimensions()
            .or_else(|| active.expected_dimensions());
    }

    EmbeddingBackendListResponse {
        active: active.id().to_string(),
        options,
    }
}

#[cfg(feature = "mcp-server")]
pub async fn run_mcp_bridge(config: Option<McpServerConfig>) -> Result<()> {
    init_tracing();

    let handles = tokio::task::spawn_blocking(build_environment)
        .await
        .context("bootstrap task panicked")?
        .context("failed to bootstrap Tanya environment")?;

    let runtime = McpRuntime::start(handles.service_cell(), config)
        .await
        .context("failed to start MCP runtime")?;

    log_mcp_startup(runtime.config());
    info!(
        target: "tanya::mcp",
        "Standalone bridge running. Press Ctrl+C to exit."
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    runtime.shutdown();
    Ok(())
}

/// Run the MCP server over stdin/stdout for clients that spawn a process.
#[cfg(feature = "mcp-server")]
pub async fn run_mcp_stdio() -> Result<()> {
    init_tracing();

    let handles = tokio::task::spawn_blocking(build_environment)
        .await
        .context("bootstrap task panicked")?
        .context("failed to bootstrap Tanya environment")?;

    info!(
        target: "tanya::mcp",
        "Starting MCP stdio server (stdin/stdout transport)..."
    );

    interfaces::mcp::run_mcp_stdio_server(handles.service_cell())
        .await
        .context("MCP stdio server failed")?;

    Ok(())
}

#[cfg(feature = "mcp-server")]
fn log_mcp_startup(config: &McpServerConfig) {
    let sse_url = config.sse_url();
    let post_url = config.post_url();
    info!(
        target: "tanya::mcp",
        bind = %config.bind_addr,
        sse = %sse_url,
        post = %post_url,
        "MCP runtime listening"
    );
}

fn open_dataset(explicit: Option<String>, config: &AppConfig) -> Result<DatasetStore> {
    let location = explicit
        .or_else(|| std::env::var(ENV_DATASET).ok())
        .or_else(|| config.dataset.source.clone())
        .filter(|raw| !raw.trim().is_empty());

    let Some(raw) = location else {
        warn!(
            target: "tanya::dataset",
            "no dataset configured; starting with an empty table"
        );
        return Ok(DatasetStore::empty());
    };

    let source = DatasetSource::parse(&raw)?;
    DatasetStore::open(source, config.dataset.fetch_timeout())
        .with_context(|| format!("failed to load dataset from {raw}"))
}

fn init_embedder(backend: &EmbeddingBackend) -> Result<(Arc<dyn EmbeddingEngine>, String)> {
    match backend {
        EmbeddingBackend::Simple { model, dimensions } => {
            let engine = SimpleEmbedEngine::try_new(model.clone(), *dimensions)?;
            Ok((Arc::new(engine), model.clone()))
        }
        EmbeddingBackend::Remote {
            endpoint,
            model,
            api_token_env,
            timeout_secs,
            dimensions,
        } => {
            let api_token = std::env::var(api_token_env)
                .ok()
                .filter(|token| !token.trim().is_empty());
            if api_token.is_none() {
                info!(
                    target: "tanya::embeddings",
                    env = %api_token_env,
                    "no API token set; calling the embedding endpoint anonymously"
                );
            }
            let engine = RemoteEmbedEngine::try_new(RemoteEngineConfig {
                endpoint: endpoint.clone(),
                model: model.clone(),
                api_token,
                timeout: std::time::Duration::from_secs((*timeout_secs).max(1)),
                dimensions: *dimensions,
            })?;
            Ok((Arc::new(engine), model.clone()))
        }
        EmbeddingBackend::Disabled => {
            let engine = DisabledEmbedEngine::default();
            Ok((Arc::new(engine), backend.model_name().to_string()))
        }
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            let engine = FastEmbedEngine::try_new(model)?;
            Ok((Arc::new(engine), model.clone()))
        }
    }
}

fn resolve_data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(ENV_DATA_DIR) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => directories::ProjectDirs::from("dev", "tanya", "Tanya")
            .ok_or_else(|| anyhow!("unable to determine OS data dir"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir).context("failed to create data directory")?;
    Ok(dir)
}
