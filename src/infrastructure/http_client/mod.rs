//! Shared HTTP plumbing for adapters that talk to remote endpoints.
//!
//! Both the remote embedding engine and the URL dataset loader use blocking
//! `ureq` agents; callers on async runtimes wrap them in `spawn_blocking`.

use std::time::Duration;

use serde::Deserialize;

/// Default timeout for dataset downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by inference-style APIs.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub estimated_time: Option<f32>,
}

/// Build an agent with a single overall timeout per request.
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Render a `ureq` error into a readable message, surfacing the API's error body when present.
pub fn describe_http_error(error: ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, response) => {
            if let Ok(err_response) = response.into_json::<ErrorResponse>() {
                match err_response.estimated_time {
                    Some(eta) => format!(
                        "HTTP {} - {} (retry in ~{:.0}s)",
                        code, err_response.error, eta
                    ),
                    None => format!("HTTP {} - {}", code, err_response.error),
                }
            } else {
                format!("HTTP error: {}", code)
            }
        }
        ureq::Error::Transport(transport) => format!("transport error: {}", transport),
    }
}
