//! MCP-backed tool providers.

use async_trait::async_trait;
use mcp::{CallToolResult, ServerConfig, Session, Tool};
use serde_json::{Map, Value};

use super::provider::{Connector, ToolProvider};

#[async_trait]
impl ToolProvider for Session {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
        Session::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::Result<CallToolResult> {
        Session::call_tool(self, name, arguments).await
    }

    async fn close(self: Box<Self>) -> mcp::Result<()> {
        Session::close(*self).await
    }
}

/// Connects to real MCP servers over their configured transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct McpConnector;

#[async_trait]
impl Connector for McpConnector {
    async fn connect(&self, config: &ServerConfig) -> mcp::Result<Box<dyn ToolProvider>> {
        let session = Session::connect(config.clone()).await?;
        Ok(Box::new(session))
    }
}
