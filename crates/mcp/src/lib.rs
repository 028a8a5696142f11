//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers, either
//! over a spawned process's stdio or over an HTTP event stream.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ServerConfig, Session};
//! use serde_json::{Map, json};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::stdio(
//!     "filesystem",
//!     "npx",
//!     ["-y", "@modelcontextprotocol/server-filesystem", "./workspace"],
//! );
//!
//! let session = Session::connect(config).await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut arguments = Map::new();
//! arguments.insert("path".into(), json!("./README.md"));
//! let result = session.call_tool("read_file", arguments).await?;
//! println!("{:?}", result.text());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod session;
mod transport;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest, ListToolsResult,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use session::{CONNECT_TIMEOUT, ServerConfig, Session};
pub use transport::{
    MAX_MESSAGE_SIZE, SseEvent, SseEventParser, SseTransport, StdioTransport, Transport,
    TransportConfig,
};
