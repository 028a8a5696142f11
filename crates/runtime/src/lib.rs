//! Deckhand runtime: tool-augmented chat over MCP servers.
//!
//! The runtime connects to a set of MCP servers, merges their tools into a
//! single catalog, and drives a conversation with a local model that may
//! call those tools.
//!
//! # Overview
//!
//! - **SessionRegistry**: the MCP sessions that connected successfully,
//!   keyed by configured server name.
//! - **catalog / router**: qualified `server__tool` names for the model, and
//!   dispatch of the model's calls back to the owning server.
//! - **Backend**: a trait abstracting the inference service (Ollama).
//! - **Agent**: the loop that reads user input, runs inference, executes
//!   tool calls, and feeds their results back.
//!
//! # Example
//!
//! ```no_run
//! use mcp::ServerConfig;
//! use runtime::{Agent, McpConnector, OllamaBackend, SessionRegistry};
//!
//! # async fn example() -> runtime::Result<()> {
//! let servers = [ServerConfig::stdio("fs", "mcp-server-filesystem", ["./workspace"])];
//! let registry = SessionRegistry::connect(servers, &McpConnector).await;
//!
//! let backend = OllamaBackend::builder("qwen3:1.7b").build();
//! let mut agent = Agent::new(backend, registry);
//! agent.refresh_tools().await;
//!
//! if let Some(reply) = agent.turn("What files are in the workspace?").await? {
//!     println!("{reply}");
//! }
//! # Ok(())
//! # }
//! ```

mod agent;
mod error;
pub mod model;
mod providers;
pub mod tools;

pub use agent::{
    Agent, AgentObserver, AgentOptions, DEFAULT_PREVIEW_LEN, Silent, UserInput, format_result,
    preview,
};
pub use error::{Error, Result};
pub use model::{
    Backend, Conversation, Fragment, FragmentStream, Message, ModelError, ModelRequest, Role,
    StreamAccumulator, ToolCall, ToolDescriptor,
};
pub use providers::{DEFAULT_HOST, OllamaBackend, OllamaBackendBuilder};
pub use tools::{
    CloseError, Connector, McpConnector, RouteError, SessionRegistry, ToolProvider, ToolResult,
};
