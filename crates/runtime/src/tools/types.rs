use mcp::CallToolResult;
use serde_json::Value;

/// Payload of a successful tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Text(String),
    Bytes(Vec<u8>),
    Structured(Value),
}

impl From<CallToolResult> for ToolResult {
    fn from(result: CallToolResult) -> Self {
        if !result.content.is_empty() {
            if let Some(text) = result.text() {
                return Self::Text(text);
            }
        }
        if let Some(structured) = result.structured_content {
            return Self::Structured(structured);
        }
        if result.content.is_empty() {
            return Self::Text(String::new());
        }
        Self::Structured(serde_json::to_value(&result.content).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call_result(value: Value) -> CallToolResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_blocks_become_text() {
        let result = call_result(json!({
            "content": [{"type": "text", "text": "[\"a.txt\",\"b.txt\"]"}]
        }));
        assert_eq!(
            ToolResult::from(result),
            ToolResult::Text("[\"a.txt\",\"b.txt\"]".into())
        );
    }

    #[test]
    fn structured_content_wins_over_non_text_blocks() {
        let result = call_result(json!({
            "content": [{"type": "image", "data": "AAAA", "mimeType": "image/png"}],
            "structuredContent": {"width": 1}
        }));
        assert_eq!(
            ToolResult::from(result),
            ToolResult::Structured(json!({"width": 1}))
        );
    }

    #[test]
    fn mixed_blocks_are_kept_as_json() {
        let result = call_result(json!({
            "content": [
                {"type": "text", "text": "caption"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"}
            ]
        }));
        match ToolResult::from(result) {
            ToolResult::Structured(Value::Array(blocks)) => assert_eq!(blocks.len(), 2),
            other => panic!("expected structured blocks, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_empty_text() {
        let result = call_result(json!({"content": []}));
        assert_eq!(ToolResult::from(result), ToolResult::Text(String::new()));
    }
}
