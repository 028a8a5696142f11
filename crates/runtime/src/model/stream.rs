use super::errors::ModelError;
use super::types::{Fragment, Message, ToolCall};

/// Folds streamed fragments into one assistant message.
///
/// Content is concatenated in arrival order and tool calls are collected
/// from every fragment. The result is only valid once a fragment with
/// `done` set has been seen.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: Vec<ToolCall>,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.content.push_str(&fragment.content);
        self.tool_calls.extend(fragment.tool_calls);
        self.done |= fragment.done;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn finish(self) -> Result<Message, ModelError> {
        if !self.done {
            return Err(ModelError::Incomplete);
        }
        Ok(Message::assistant(self.content).with_tool_calls(self.tool_calls))
    }
}
