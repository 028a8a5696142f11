//! Ollama chat API backend.

use crate::model::{
    Backend, Fragment, FragmentStream, Message, ModelError, ModelRequest, Role, ToolCall,
    ToolDescriptor,
};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Longest NDJSON line accepted from a streamed reply.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCallOut<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ApiToolCallOut<'a> {
    function: ApiFunctionCallOut<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCallOut<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    message: Option<ApiResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ApiToolCallIn>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallIn {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunctionCallIn,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCallIn {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    host: String,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            host: DEFAULT_HOST.to_string(),
        }
    }

    /// Server address. A bare `host:port` is treated as plain HTTP.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            chat_url: format!("{}/api/chat", normalize_host(&self.host)),
            model: self.model,
        }
    }
}

/// Ollama `/api/chat` backend.
pub struct OllamaBackend {
    client: reqwest::Client,
    chat_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn message_to_api(msg: &Message) -> ApiMessage<'_> {
        ApiMessage {
            role: Self::role_to_api(msg.role),
            content: &msg.content,
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| ApiToolCallOut {
                    function: ApiFunctionCallOut {
                        name: &call.name,
                        arguments: &call.arguments,
                    },
                })
                .collect(),
            tool_name: msg.tool_name.as_deref(),
        }
    }

    fn tool_to_api(tool: &ToolDescriptor) -> ApiTool<'_> {
        ApiTool {
            tool_type: "function",
            function: ApiFunction {
                name: &tool.qualified_name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        }
    }

    fn build_request<'a>(&'a self, request: ModelRequest<'a>, stream: bool) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            messages: request.messages.iter().map(Self::message_to_api).collect(),
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
            stream,
        }
    }

    async fn post(&self, body: &ApiRequest<'_>) -> Result<reqwest::Response, ModelError> {
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            stream = body.stream,
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }
        Ok(response)
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({}, {})", self.model, self.chat_url)
    }
}

impl Backend for OllamaBackend {
    async fn chat(&self, request: ModelRequest<'_>) -> Result<Message, ModelError> {
        let body = self.build_request(request, false);
        let response = self.post(&body).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let fragment = response_to_fragment(api_response)?;
        Ok(Message::assistant(fragment.content).with_tool_calls(fragment.tool_calls))
    }

    async fn chat_stream(&self, request: ModelRequest<'_>) -> Result<FragmentStream, ModelError> {
        let body = self.build_request(request, true);
        let response = self.post(&body).await?;

        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let fragments = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
            .map_err(|e| ModelError::Network(e.to_string()))
            .try_filter(|line| futures::future::ready(!line.trim().is_empty()))
            .and_then(|line| futures::future::ready(parse_line(&line)));

        Ok(fragments.boxed())
    }
}

/// Decode one NDJSON line of a streamed reply.
fn parse_line(line: &str) -> Result<Fragment, ModelError> {
    let response: ApiResponse = serde_json::from_str(line)
        .map_err(|e| ModelError::InvalidResponse(format!("{e}: {line}")))?;
    response_to_fragment(response)
}

fn response_to_fragment(response: ApiResponse) -> Result<Fragment, ModelError> {
    if let Some(error) = response.error {
        return Err(ModelError::Api(error));
    }

    let (content, tool_calls) = match response.message {
        Some(message) => (
            message.content,
            message
                .tool_calls
                .into_iter()
                .map(call_from_api)
                .collect(),
        ),
        None if response.done => (String::new(), Vec::new()),
        None => {
            return Err(ModelError::InvalidResponse(
                "response has no message".to_string(),
            ));
        }
    };

    Ok(Fragment {
        content,
        tool_calls,
        done: response.done,
    })
}

/// Some models emit arguments as a JSON-encoded string rather than an object.
///
/// A string that does not decode is kept as is; the router rejects it as a
/// failed call so the model can retry.
fn call_from_api(call: ApiToolCallIn) -> ToolCall {
    let arguments = match call.function.arguments {
        Value::String(raw) if raw.trim().is_empty() => Value::Null,
        Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(tool = %call.function.name, error = %e, "tool arguments are not JSON");
                Value::String(raw)
            }
        },
        other => other,
    };

    match call.id {
        Some(id) if !id.is_empty() => ToolCall::with_id(id, call.function.name, arguments),
        _ => ToolCall::new(call.function.name, arguments),
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_normalization() {
        assert_eq!(normalize_host("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_host("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(normalize_host("https://gpu.example:443"), "https://gpu.example:443");

        let backend = OllamaBackend::builder("qwen3:1.7b").build();
        assert_eq!(backend.to_string(), "ollama(qwen3:1.7b, http://localhost:11434/api/chat)");
    }

    #[test]
    fn request_carries_tools_and_tool_messages() {
        let backend = OllamaBackend::builder("qwen3:1.7b").build();
        let call = ToolCall::with_id("c1", "fs__list_files", json!({"path": "."}));
        let messages = vec![
            Message::user("What files are there?"),
            Message::assistant("").with_tool_calls(vec![call.clone()]),
            Message::tool_result(&call, "[\"a.txt\",\"b.txt\"]"),
        ];
        let tools = vec![ToolDescriptor {
            qualified_name: "fs__list_files".into(),
            description: "List files".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];

        let body = backend.build_request(
            ModelRequest {
                messages: &messages,
                tools: &tools,
            },
            false,
        );
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "qwen3:1.7b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "fs__list_files");
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "What files are there?"}));
        assert_eq!(
            value["messages"][1]["tool_calls"][0]["function"],
            json!({"name": "fs__list_files", "arguments": {"path": "."}})
        );
        assert_eq!(value["messages"][2]["role"], "tool");
        assert_eq!(value["messages"][2]["tool_name"], "fs__list_files");
    }

    #[test]
    fn empty_tool_list_is_omitted() {
        let backend = OllamaBackend::builder("m").build();
        let body = backend.build_request(
            ModelRequest {
                messages: &[],
                tools: &[],
            },
            true,
        );
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn parses_streamed_lines() {
        let text = parse_line(r#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}"#)
            .unwrap();
        assert_eq!(text, Fragment::text("Hel"));

        let done = parse_line(r#"{"model":"m","done":true,"done_reason":"stop"}"#).unwrap();
        assert!(done.done);
        assert!(done.content.is_empty());
    }

    #[test]
    fn tool_calls_get_ids_and_parsed_arguments() {
        let fragment = parse_line(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[
                {"function":{"name":"fs__list_files","arguments":{"path":"."}}},
                {"id":"call_7","function":{"name":"fs__read","arguments":"{\"path\":\"a.txt\"}"}}
            ]},"done":false}"#,
        )
        .unwrap();

        assert_eq!(fragment.tool_calls.len(), 2);
        assert!(!fragment.tool_calls[0].id.is_empty());
        assert_eq!(fragment.tool_calls[0].arguments, json!({"path": "."}));
        assert_eq!(fragment.tool_calls[1].id, "call_7");
        assert_eq!(fragment.tool_calls[1].arguments, json!({"path": "a.txt"}));
    }

    #[test]
    fn undecodable_arguments_are_kept_raw() {
        let fragment = parse_line(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[
                {"function":{"name":"fs__read","arguments":"{\"path\": "}}
            ]},"done":true}"#,
        )
        .unwrap();

        assert_eq!(fragment.tool_calls[0].name, "fs__read");
        assert_eq!(fragment.tool_calls[0].arguments, json!("{\"path\": "));
    }

    #[test]
    fn error_lines_map_to_api_errors() {
        let err = parse_line(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, ModelError::Api(msg) if msg.contains("not found")));

        let err = parse_line("<html>").unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let backend = OllamaBackend::builder("m").host("http://127.0.0.1:9").build();
        let err = backend
            .chat(ModelRequest {
                messages: &[Message::user("hi")],
                tools: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
    }
}
