//! Infrastructure layer wiring concrete adapters (embeddings, datasets, HTTP).

pub mod dataset;
pub mod embeddings;
pub mod http_client;

pub use dataset::DatasetStore;
pub use embeddings::DisabledEmbedEngine;
#[cfg(feature = "fastembed-engine")]
pub use embeddings::FastEmbedEngine;
pub use embeddings::{RemoteEmbedEngine, RemoteEngineConfig, SimpleEmbedEngine};
