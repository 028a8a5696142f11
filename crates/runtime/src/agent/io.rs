//! How the agent talks to whoever is driving it.

use std::future::Future;
use std::io;

use crate::model::ToolCall;
use crate::tools::RouteError;

/// Source of user messages.
pub trait UserInput: Send {
    /// The next message, or `None` at end of input.
    fn read_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

/// Progress callbacks. Every method defaults to doing nothing.
pub trait AgentObserver: Send + Sync {
    /// A streamed piece of assistant text.
    fn on_text(&self, _fragment: &str) {}

    /// A streamed reply finished.
    fn on_stream_end(&self) {}

    /// Complete assistant text from a non-streaming reply.
    fn on_assistant(&self, _text: &str) {}

    fn on_tool_call(&self, _call: &ToolCall) {}

    /// `preview` is already truncated for display.
    fn on_tool_result(&self, _call: &ToolCall, _preview: &str) {}

    fn on_tool_error(&self, _call: &ToolCall, _error: &RouteError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl AgentObserver for Silent {}
