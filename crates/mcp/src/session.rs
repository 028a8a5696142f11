//! MCP session lifecycle (bind, handshake, requests, close).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult,
    JsonRpcMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest, ListToolsParams,
    ListToolsResult, METHOD_NOT_FOUND, RequestId, ServerInfo, Tool,
};
use crate::transport::{Transport, TransportConfig};

/// Bound on binding + handshake, and on catalog queries.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub transport: TransportConfig,
}

impl ServerConfig {
    /// A subprocess server.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::Stdio {
                command: command.into(),
                args: args.into_iter().map(Into::into).collect(),
                env: HashMap::new(),
            },
        }
    }

    /// An HTTP+SSE server.
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::Sse {
                url: url.into(),
                headers: HashMap::new(),
            },
        }
    }
}

/// A live, initialized connection to one MCP server.
pub struct Session {
    name: String,
    transport: Transport,
    exchange: Mutex<()>,
    next_id: AtomicI64,
    server_info: Option<ServerInfo>,
}

impl Session {
    /// Bind the transport and complete the MCP handshake.
    ///
    /// A session is only returned once the server has answered `initialize`;
    /// on any failure the transport is dropped, which terminates it.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        timeout(CONNECT_TIMEOUT, Self::establish(config))
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn establish(config: ServerConfig) -> Result<Self> {
        let transport = Transport::bind(&config.transport).await?;
        let mut session = Self {
            name: config.name,
            transport,
            exchange: Mutex::new(()),
            next_id: AtomicI64::new(1),
            server_info: None,
        };

        let result: InitializeResult = session
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        session.notify("notifications/initialized").await?;

        if result.capabilities.tools.is_none() {
            warn!(server = %session.name, "server does not advertise tool support");
        }
        info!(
            server = %session.name,
            transport = config.transport.kind(),
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "session initialized"
        );
        session.server_info = Some(result.server_info);

        Ok(session)
    }

    /// Get the configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server identity reported during the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// List every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        timeout(CONNECT_TIMEOUT, self.list_all_tools())
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn list_all_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as [`Error::ToolCallFailed`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            let error_text = result
                .content
                .iter()
                .filter_map(|c| c.as_text())
                .collect::<Vec<_>>()
                .join("\n");
            if error_text.is_empty() {
                return Err(Error::ToolCallFailed("tool reported an error".to_string()));
            }
            return Err(Error::ToolCallFailed(error_text));
        }

        Ok(result)
    }

    /// Close the session and terminate the transport.
    pub async fn close(self) -> Result<()> {
        debug!(server = %self.name, "closing session");
        self.transport.close().await
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        // One request/response pair in flight per session.
        let _exchange = self.exchange.lock().await;

        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        self.transport.send(&serde_json::to_string(&request)?).await?;
        let value = self.await_response(&id).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification = JsonRpcNotification::new(method);
        self.transport
            .send(&serde_json::to_string(&notification)?)
            .await
    }

    async fn await_response(&self, id: &RequestId) -> Result<Value> {
        loop {
            let raw = self.transport.recv().await?;
            let message: JsonRpcMessage = match serde_json::from_str(&raw) {
                Ok(message) => message,
                Err(e) => {
                    warn!(server = %self.name, "discarding unparseable message: {e}");
                    continue;
                }
            };

            match message.classify() {
                Some(Incoming::Response { id: got, outcome }) if got == *id => {
                    return Ok(outcome?);
                }
                Some(Incoming::Response { id: got, .. }) => {
                    debug!(server = %self.name, %got, "discarding stale response");
                }
                Some(Incoming::Request { id, method }) => self.answer(id, &method).await?,
                Some(Incoming::Notification { method, params }) => {
                    debug!(server = %self.name, %method, ?params, "server notification");
                }
                None => {
                    warn!(server = %self.name, "discarding message that is neither request nor response");
                }
            }
        }
    }

    async fn answer(&self, id: RequestId, method: &str) -> Result<()> {
        let reply = match method {
            "ping" => JsonRpcReply::result(id, Value::Object(Map::new())),
            other => {
                debug!(server = %self.name, method = other, "rejecting server request");
                JsonRpcReply::error(id, METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
        };
        self.transport.send(&serde_json::to_string(&reply)?).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    /// A scripted stdio server. Request ids are deterministic: 1 initialize,
    /// 2 tools/list, 3 and 4 tools/call.
    const FAKE_SERVER: &str = r#"
read line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-fs","version":"0.1"}}}'
read line
read line
printf '%s\n' 'not json at all'
printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"listing"}}'
printf '%s\n' '{"jsonrpc":"2.0","id":99,"result":{}}'
printf '%s\n' '{"jsonrpc":"2.0","id":"srv-1","method":"ping"}'
read reply
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"list_files","description":"List files","inputSchema":{"type":"object"}}]}}'
read line
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"a.txt"},{"type":"text","text":"b.txt"}]}}'
read line
printf '%s\n' '{"jsonrpc":"2.0","id":4,"result":{"content":[{"type":"text","text":"permission denied"}],"isError":true}}'
read line
"#;

    fn fake_server() -> ServerConfig {
        ServerConfig::stdio("fs", "sh", ["-c", FAKE_SERVER])
    }

    #[tokio::test]
    async fn stdio_session_round_trip() {
        let session = Session::connect(fake_server()).await.unwrap();
        assert_eq!(session.name(), "fs");
        assert_eq!(session.server_info().unwrap().name, "fake-fs");

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "list_files");

        let result = session.call_tool("list_files", Map::new()).await.unwrap();
        assert_eq!(result.text().as_deref(), Some("a.txt\nb.txt"));

        let err = session
            .call_tool("list_files", json!({"path": "/root"}).as_object().cloned().unwrap())
            .await
            .unwrap_err();
        match err {
            Error::ToolCallFailed(text) => assert_eq!(text, "permission denied"),
            other => panic!("expected tool failure, got {other}"),
        }

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_command_fails_to_spawn() {
        let config = ServerConfig::stdio("ghost", "/nonexistent/deckhand-test-server", [""; 0]);
        let result = Session::connect(config).await;
        assert!(matches!(result, Err(Error::Spawn(_))));
    }

    #[tokio::test]
    async fn server_exiting_during_handshake_is_an_error() {
        let config = ServerConfig::stdio("quitter", "sh", ["-c", "exit 0"]);
        let result = Session::connect(config).await;
        assert!(matches!(
            result,
            Err(Error::ServerExited) | Err(Error::Io(_))
        ));
    }
}
