//! Dispatch of qualified tool calls to the owning provider.

use serde_json::{Map, Value};
use tracing::debug;

use super::catalog::parse_qualified;
use super::errors::RouteError;
use super::registry::SessionRegistry;
use super::types::ToolResult;

/// Route `qualified_name` to its provider and execute it.
///
/// `null` arguments are treated as an empty object.
pub async fn invoke(
    registry: &SessionRegistry,
    qualified_name: &str,
    arguments: &Value,
) -> Result<ToolResult, RouteError> {
    let (provider, tool) = parse_qualified(qualified_name)?;

    let session = registry
        .get(provider)
        .ok_or_else(|| RouteError::UnknownProvider(provider.to_string()))?;

    let execution_error = |message: String| RouteError::Execution {
        provider: provider.to_string(),
        tool: tool.to_string(),
        message,
    };

    let arguments = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(execution_error(format!(
                "arguments must be a JSON object, got {other}"
            )));
        }
    };

    debug!(server = provider, tool, "calling tool");
    let result = session
        .call_tool(tool, arguments)
        .await
        .map_err(|e| match e {
            mcp::Error::ToolCallFailed(text) => execution_error(text),
            other => execution_error(other.to_string()),
        })?;

    Ok(ToolResult::from(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolProvider;
    use async_trait::async_trait;
    use mcp::{CallToolResult, Tool};
    use serde_json::json;

    /// Echoes the tool name and arguments back as text, failing on "fail".
    struct Echo;

    #[async_trait]
    impl ToolProvider for Echo {
        async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> mcp::Result<CallToolResult> {
            if name == "fail" {
                return Err(mcp::Error::ToolCallFailed("permission denied".into()));
            }
            Ok(serde_json::from_value(json!({
                "content": [{"type": "text", "text": format!("{name} {}", Value::Object(arguments))}]
            }))
            .unwrap())
        }

        async fn close(self: Box<Self>) -> mcp::Result<()> {
            Ok(())
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::from_providers([(
            "fs".to_string(),
            Box::new(Echo) as Box<dyn ToolProvider>,
        )])
    }

    #[tokio::test]
    async fn routes_to_provider_with_unqualified_name() {
        let result = invoke(&registry(), "fs__read_file", &json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(
            result,
            ToolResult::Text("read_file {\"path\":\"a.txt\"}".into())
        );
    }

    #[tokio::test]
    async fn null_arguments_become_empty_object() {
        let result = invoke(&registry(), "fs__list", &Value::Null).await.unwrap();
        assert_eq!(result, ToolResult::Text("list {}".into()));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let err = invoke(&registry(), "fs__list", &json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::Execution { ref provider, .. } if provider == "fs"));
    }

    #[tokio::test]
    async fn unknown_provider() {
        let err = invoke(&registry(), "ghost__read", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "server ghost not found");
    }

    #[tokio::test]
    async fn malformed_name() {
        let err = invoke(&registry(), "readfile", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tool name format: readfile");
    }

    #[tokio::test]
    async fn provider_failure_is_an_execution_error() {
        let err = invoke(&registry(), "fs__fail", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to call tool fail on server fs: permission denied"
        );
    }
}
