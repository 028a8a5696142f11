//! Rendering tool results as conversation text.

use std::borrow::Cow;

use crate::tools::ToolResult;

/// Default on-screen preview length, in characters.
pub const DEFAULT_PREVIEW_LEN: usize = 500;

const TRUNCATION_MARKER: &str = "... (truncated)";

/// Text stored in the conversation for a successful call.
///
/// Text and bytes pass through verbatim; structured values are pretty-printed.
pub fn format_result(result: &ToolResult) -> String {
    match result {
        ToolResult::Text(text) => text.clone(),
        ToolResult::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ToolResult::Structured(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

/// At most `max_chars` characters of `text`, marked when cut.
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_and_bytes_are_verbatim() {
        assert_eq!(format_result(&ToolResult::Text("a\nb".into())), "a\nb");
        assert_eq!(
            format_result(&ToolResult::Bytes(b"raw bytes".to_vec())),
            "raw bytes"
        );
    }

    #[test]
    fn structured_values_are_indented() {
        let text = format_result(&ToolResult::Structured(json!({"files": ["a.txt"]})));
        assert_eq!(text, "{\n  \"files\": [\n    \"a.txt\"\n  ]\n}");
    }

    #[test]
    fn short_text_is_not_truncated() {
        assert!(matches!(preview("hello", 500), Cow::Borrowed("hello")));
        assert_eq!(preview("hello", 5), "hello");
    }

    #[test]
    fn long_text_is_cut_at_char_boundary() {
        let long = "é".repeat(600);
        let shown = preview(&long, DEFAULT_PREVIEW_LEN);
        assert!(shown.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            shown.chars().count(),
            DEFAULT_PREVIEW_LEN + TRUNCATION_MARKER.chars().count()
        );
    }
}
