pub mod disabled_engine;
pub mod remote_engine;
pub mod simple_engine;

#[cfg(feature = "fastembed-engine")]
pub mod fastembed_engine;

pub use disabled_engine::DisabledEmbedEngine;
#[cfg(feature = "fastembed-engine")]
pub use fastembed_engine::FastEmbedEngine;
pub use remote_engine::{RemoteEmbedEngine, RemoteEngineConfig};
pub use simple_engine::SimpleEmbedEngine;

use crate::domain::DomainError;

/// Checks shared by every engine: the caller asked for the model this engine
/// serves, and there is text to embed.
pub(crate) fn ensure_request(served: &str, requested: &str, text: &str) -> Result<(), DomainError> {
    if !requested.eq_ignore_ascii_case(served) {
        return Err(DomainError::embedding(format!(
            "engine initialised for `{}` but `{}` requested",
            served, requested
        )));
    }
    if text.trim().is_empty() {
        return Err(DomainError::validation("text payload cannot be empty"));
    }
    Ok(())
}
