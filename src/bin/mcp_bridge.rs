#[cfg(feature = "mcp-server")]
use tanya_lib::run_mcp_bridge;

#[cfg(feature = "mcp-server")]
#[tokio::main]
async fn main() {
    if let Err(err) = run_mcp_bridge(None).await {
        eprintln!("[tanya::mcp-bridge] runtime failed: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!(
        "[tanya::mcp-bridge] build with `--features mcp-server` to enable the MCP bridge binary."
    );
    std::process::exit(1);
}
