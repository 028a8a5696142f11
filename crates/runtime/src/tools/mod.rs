//! MCP tool providers, the combined catalog, and call routing.

pub mod catalog;
pub mod errors;
mod mcp_host;
mod provider;
mod registry;
pub mod router;
mod types;

pub use catalog::{SEPARATOR, is_routable, parse_qualified, qualify};
pub use errors::{CloseError, RouteError};
pub use mcp_host::McpConnector;
pub use provider::{Connector, ToolProvider};
pub use registry::SessionRegistry;
pub use types::ToolResult;
