use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context as AnyhowContext, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_router,
    transport::sse_server::{SseServer, SseServerConfig},
    ErrorData as McpError, ServerHandler,
};
use serde_json::json;
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::{
    application::{dtos::EmptyArgs, SearchRequest, SearchService},
    domain::DomainError,
    ServiceCell,
};

const ENV_BIND_ADDR: &str = "TANYA_MCP_BIND_ADDR";
const ENV_SSE_PATH: &str = "TANYA_MCP_SSE_PATH";
const ENV_POST_PATH: &str = "TANYA_MCP_POST_PATH";
const ENV_KEEP_ALIVE_SECS: &str = "TANYA_MCP_KEEP_ALIVE_SECS";

const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 5210);
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Where the SSE transport listens and how often it pings idle sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub bind_addr: SocketAddr,
    pub sse_path: String,
    pub post_path: String,
    pub keep_alive: Duration,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            sse_path: "/sse".into(),
            post_path: "/message".into(),
            keep_alive: Duration::from_secs(30),
        }
    }
}

impl McpServerConfig {
    /// Defaults, overridden by every `TANYA_MCP_*` variable that parses.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_value(ENV_BIND_ADDR, |raw| raw.parse().ok())
                .unwrap_or(defaults.bind_addr),
            sse_path: env_value(ENV_SSE_PATH, |raw| Some(route_path(raw)))
                .unwrap_or(defaults.sse_path),
            post_path: env_value(ENV_POST_PATH, |raw| Some(route_path(raw)))
                .unwrap_or(defaults.post_path),
            keep_alive: env_value(ENV_KEEP_ALIVE_SECS, |raw| raw.parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.max(MIN_KEEP_ALIVE_SECS)))
                .unwrap_or(defaults.keep_alive),
        }
    }

    pub fn sse_url(&self) -> String {
        format!("http://{}{}", self.bind_addr, self.sse_path)
    }

    pub fn post_url(&self) -> String {
        format!("http://{}{}", self.bind_addr, self.post_path)
    }
}

fn env_value<T>(key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    env::var(key).ok().and_then(|raw| parse(raw.trim()))
}

/// Route paths always start with exactly one `/`.
fn route_path(raw: &str) -> String {
    format!("/{}", raw.trim().trim_start_matches('/'))
}

/// A running SSE transport. Dropping it stops the listener and every session.
pub struct McpRuntime {
    config: McpServerConfig,
    listener: CancellationToken,
    sessions: CancellationToken,
}

impl McpRuntime {
    pub async fn start(service_cell: ServiceCell, config: Option<McpServerConfig>) -> Result<Self> {
        let config = config.unwrap_or_else(McpServerConfig::from_env);
        let listener = CancellationToken::new();

        let server = SseServer::serve_with_config(SseServerConfig {
            bind: config.bind_addr,
            sse_path: config.sse_path.clone(),
            post_path: config.post_path.clone(),
            ct: listener.clone(),
            sse_keep_alive: Some(config.keep_alive),
        })
        .await
        .with_context(|| format!("failed to bind MCP SSE listener on {}", config.bind_addr))?;

        let sessions = server.with_service(move || TanyaMcpServer::new(Arc::clone(&service_cell)));

        Ok(Self {
            config,
            listener,
            sessions,
        })
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for McpRuntime {
    fn drop(&mut self) {
        self.sessions.cancel();
        self.listener.cancel();
    }
}

#[derive(Clone)]
pub struct TanyaMcpServer {
    service_cell: ServiceCell,
    tool_router: ToolRouter<Self>,
}

impl TanyaMcpServer {
    pub fn new(service_cell: ServiceCell) -> Self {
        Self {
            service_cell,
            tool_router: Self::tool_router(),
        }
    }

    fn current_service(&self) -> Arc<SearchService> {
        Arc::clone(&self.service_cell.read())
    }

    async fn search(&self, payload: SearchRequest) -> Result<CallToolResult, McpError> {
        let service = self.current_service();
        let response = task::spawn_blocking(move || service.search(payload))
            .await
            .map_err(|err| internal_error(err.to_string()))?
            .map_err(map_domain_error)?;

        let value =
            serde_json::to_value(response).map_err(|err| internal_error(err.to_string()))?;
        Ok(CallToolResult::structured(value))
    }

    async fn describe_dataset(&self) -> Result<CallToolResult, McpError> {
        let summary = self.current_service().dataset_info();
        let value = serde_json::to_value(summary).map_err(|err| internal_error(err.to_string()))?;
        Ok(CallToolResult::structured(value))
    }
}

#[tool_router]
impl TanyaMcpServer {
    #[tool(
        name = "search_answers",
        description = "Rank stored answers against a question. Combines embedding similarity with a keyword bonus and returns grouped results, best first."
    )]
    async fn search_answers(
        &self,
        Parameters(payload): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.search(payload).await
    }

    #[tool(
        name = "dataset_info",
        description = "Describe the loaded Q&A table: source, record and question counts, embedding dimensions."
    )]
    async fn dataset_info(
        &self,
        Parameters(_): Parameters<EmptyArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.describe_dataset().await
    }
}

impl ServerHandler for TanyaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "tanya-mcp".into(),
                title: Some("Tanya Answer Search".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"Tanya answers questions from a curated Q&A table.

Call search_answers with the user's question before answering from memory.
Results are grouped by stored question and ordered by score; each group may
carry several answers. A response with "degraded": true was ranked by keywords
only because the embedding provider was unavailable.

Call dataset_info to see which table is loaded and how large it is."#
                    .into(),
            ),
        }
    }
}

fn map_domain_error(err: DomainError) -> McpError {
    match err {
        DomainError::Validation(msg) | DomainError::LimitExceeded(msg) => {
            McpError::invalid_params("invalid request", Some(json!({ "detail": msg })))
        }
        DomainError::DimensionMismatch { expected, actual } => McpError::invalid_params(
            "embedding dimension mismatch",
            Some(json!({ "expected": expected, "actual": actual })),
        ),
        DomainError::Dataset(msg) | DomainError::Embedding(msg) => {
            McpError::internal_error("internal error", Some(json!({ "detail": msg })))
        }
    }
}

fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(
        "internal MCP server error",
        Some(json!({ "detail": message.into() })),
    )
}

/// Run the MCP server over stdin/stdout, one JSON-RPC message per line.
pub async fn run_mcp_stdio_server(service_cell: ServiceCell) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tracing::{debug, error, info};

    info!(target: "tanya::mcp", "Starting MCP stdio server...");

    let server = TanyaMcpServer::new(service_cell);
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let response = match reader.read_line(&mut line).await {
            Ok(0) => {
                info!(target: "tanya::mcp", "Client closed stdio connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                debug!(target: "tanya::mcp", "Received: {}", trimmed);

                match serde_json::from_str::<serde_json::Value>(trimmed) {
                    Ok(request) => {
                        // Notifications carry no id and expect no reply.
                        if request.get("id").is_none() {
                            continue;
                        }
                        handle_jsonrpc_request(&server, request).await
                    }
                    Err(e) => {
                        error!(target: "tanya::mcp", "Failed to parse JSON-RPC request: {}", e);
                        json!({
                            "jsonrpc": "2.0",
                            "id": null,
                            "error": {
                                "code": -32700,
                                "message": format!("Parse error: {}", e)
                            }
                        })
                    }
                }
            }
            Err(e) => {
                error!(target: "tanya::mcp", "Failed to read from stdin: {}", e);
                break;
            }
        };

        let response_json = response.to_string();
        if let Err(e) = stdout.write_all(response_json.as_bytes()).await {
            error!(target: "tanya::mcp", "Failed to write response: {}", e);
            break;
        }
        if let Err(e) = stdout.write_all(b"\n").await {
            error!(target: "tanya::mcp", "Failed to write newline: {}", e);
            break;
        }
        if let Err(e) = stdout.flush().await {
            error!(target: "tanya::mcp", "Failed to flush stdout: {}", e);
            break;
        }

        debug!(target: "tanya::mcp", "Sent: {}", response_json);
    }

    info!(target: "tanya::mcp", "MCP stdio server terminated");
    Ok(())
}

/// Dispatch one JSON-RPC request to the matching MCP handler.
async fn handle_jsonrpc_request(
    server: &TanyaMcpServer,
    request: serde_json::Value,
) -> serde_json::Value {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");

    match method {
        "initialize" => {
            let info = server.get_info();
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": info.protocol_version,
                    "capabilities": info.capabilities,
                    "serverInfo": info.server_info,
                    "instructions": info.instructions
                }
            })
        }
        "ping" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {}
        }),
        "tools/list" => {
            let tools = server.tool_router.list_all();
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "tools": tools
                }
            })
        }
        "tools/call" => {
            let Some(params) = request.get("params") else {
                return json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32602,
                        "message": "Invalid params"
                    }
                });
            };

            let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            let result = match tool_name {
                "search_answers" => match serde_json::from_value::<SearchRequest>(arguments) {
                    Ok(req) => server.search(req).await,
                    Err(e) => Err(McpError::invalid_params(
                        "Invalid search_answers arguments",
                        Some(json!({"detail": e.to_string()})),
                    )),
                },
                "dataset_info" => server.describe_dataset().await,
                _ => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", tool_name),
                    None,
                )),
            };

            match result {
                Ok(result) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": result
                }),
                Err(e) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": e.code,
                        "message": e.message,
                        "data": e.data
                    }
                }),
            }
        }
        _ => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32601,
                "message": format!("Method not found: {}", method)
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{EmbeddingEngine, RecordSource, ServiceConfig};
    use crate::domain::{Dataset, DatasetSource, Record};
    use crate::infrastructure::DatasetStore;
    use parking_lot::RwLock;

    struct AxisEngine;

    impl EmbeddingEngine for AxisEngine {
        fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>, DomainError> {
            Ok(vec![1.0, 0.0])
        }

        fn dims(&self, _model: &str) -> Option<usize> {
            Some(2)
        }
    }

    fn server() -> TanyaMcpServer {
        let dataset = Dataset::new(
            vec![
                Record::new("How do refunds work?", "Within 30 days.", vec![1.0, 0.0]),
                Record::new("How do refunds work?", "Contact support.", vec![1.0, 0.0]),
                Record::new("Shipping times", "Two weeks.", vec![0.0, 1.0]),
            ],
            DatasetSource::Inline,
        )
        .unwrap();
        let source: Arc<dyn RecordSource> = Arc::new(DatasetStore::in_memory(dataset));
        let service = SearchService::new(Arc::new(AxisEngine), source, ServiceConfig::default());
        TanyaMcpServer::new(Arc::new(RwLock::new(Arc::new(service))))
    }

    #[test]
    fn route_path_has_single_leading_slash() {
        assert_eq!(route_path("sse"), "/sse");
        assert_eq!(route_path("  /message "), "/message");
        assert_eq!(route_path("//events"), "/events");
        assert_eq!(route_path(""), "/");
    }

    #[test]
    fn default_config_urls_point_at_loopback() {
        let config = McpServerConfig::default();
        assert_eq!(config.sse_url(), "http://127.0.0.1:5210/sse");
        assert_eq!(config.post_url(), "http://127.0.0.1:5210/message");
    }

    #[test]
    fn domain_errors_map_to_json_rpc_codes() {
        let code = |err: DomainError| map_domain_error(err).code.0;

        assert_eq!(code(DomainError::validation("empty")), -32602);
        assert_eq!(code(DomainError::limit("too long")), -32602);
        assert_eq!(code(DomainError::dimension_mismatch(3, 2)), -32602);
        assert_eq!(code(DomainError::embedding("down")), -32603);
        assert_eq!(code(DomainError::dataset("gone")), -32603);
    }

    #[tokio::test]
    async fn tools_list_exposes_both_tools() {
        let response =
            handle_jsonrpc_request(&server(), json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
                .await;

        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"search_answers"));
        assert!(names.contains(&"dataset_info"));
    }

    #[tokio::test]
    async fn search_answers_returns_grouped_results() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {
                "name": "search_answers",
                "arguments": { "query": "how do refunds work" }
            }
        });

        let response = handle_jsonrpc_request(&server(), request).await;
        let results = &response["result"]["structuredContent"]["results"];

        assert_eq!(response["id"], 7);
        assert_eq!(results[0]["question"], "How do refunds work?");
        assert_eq!(results[0]["answers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_query_maps_to_invalid_params() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "search_answers", "arguments": { "query": "   " } }
        });

        let response = handle_jsonrpc_request(&server(), request).await;
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let response =
            handle_jsonrpc_request(&server(), json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
                .await;
        assert_eq!(response["error"]["code"], -32601);
    }
}
