//! Seams between the registry and live MCP sessions.

use async_trait::async_trait;
use mcp::{CallToolResult, ServerConfig, Tool};
use serde_json::{Map, Value};

/// One connected tool server, as seen by the registry.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<CallToolResult>;

    /// Release the connection. Called at most once.
    async fn close(self: Box<Self>) -> mcp::Result<()>;
}

/// Turns a server configuration into a live provider.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ServerConfig) -> mcp::Result<Box<dyn ToolProvider>>;
}
