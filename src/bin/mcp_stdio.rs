#[cfg(feature = "mcp-server")]
use tanya_lib::run_mcp_stdio;

/// MCP server over stdio (stdin/stdout), for clients that spawn a process
/// and speak line-delimited JSON-RPC, such as editor MCP extensions.
///
/// Logs go to stderr so stdout carries protocol messages only.
///
/// # Example Configuration
///
/// ```json
/// {
///   "mcpServers": {
///     "tanya": {
///       "command": "/path/to/mcp-stdio",
///       "args": [],
///       "env": { "TANYA_DATASET": "/path/to/qa_with_embeddings.json" }
///     }
///   }
/// }
/// ```
///
/// # Environment Variables
///
/// - `TANYA_LOG`: logging filter (trace, debug, info, warn, error)
/// - `TANYA_DATA_DIR`: override the data directory
/// - `TANYA_DATASET`: path or URL of the embedded Q&A table
#[cfg(feature = "mcp-server")]
#[tokio::main]
async fn main() {
    if let Err(err) = run_mcp_stdio().await {
        eprintln!("[tanya::mcp-stdio] Runtime failed: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!(
        "[tanya::mcp-stdio] Build with `--features mcp-server` to enable the MCP stdio bridge."
    );
    eprintln!("Example: cargo build --release --bin mcp-stdio --features mcp-server");
    std::process::exit(1);
}
