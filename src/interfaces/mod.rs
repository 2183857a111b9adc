// Interfaces exposed by optional adapters (MCP servers and bridges).
//
// Each submodule is feature-gated by the capability it implements.
#[cfg(feature = "mcp-server")]
pub mod mcp;
