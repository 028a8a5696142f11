//! The conversation loop: user input, inference, tool rounds.

mod format;
mod io;

pub use format::{DEFAULT_PREVIEW_LEN, format_result, preview};
pub use io::{AgentObserver, Silent, UserInput};

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    Backend, Conversation, Message, ModelRequest, StreamAccumulator, ToolCall, ToolDescriptor,
};
use crate::tools::{SessionRegistry, catalog, router};

const CANCELLED_RESULT: &str = "Error: cancelled";

/// Agent behavior switches.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Request streamed replies and surface text as it arrives.
    pub stream: bool,
    /// Characters of each tool result shown to the operator.
    pub preview_len: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            stream: false,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

/// Drives one conversation against a backend and a set of tool providers.
///
/// One turn, including every tool round it triggers, completes before the
/// next user message is read. Tool calls within a reply run in order.
pub struct Agent<B: Backend> {
    backend: B,
    registry: SessionRegistry,
    tools: Vec<ToolDescriptor>,
    conversation: Conversation,
    options: AgentOptions,
    observer: Box<dyn AgentObserver>,
    inference: Mutex<()>,
    cancel: CancellationToken,
}

impl<B: Backend> Agent<B> {
    pub fn new(backend: B, registry: SessionRegistry) -> Self {
        Self {
            backend,
            registry,
            tools: Vec::new(),
            conversation: Conversation::new(),
            options: AgentOptions::default(),
            observer: Box::new(Silent),
            inference: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: impl AgentObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Share a cancellation signal with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The catalog advertised to the model.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether an inference exchange is in flight.
    pub fn is_inferring(&self) -> bool {
        self.inference.try_lock().is_err()
    }

    /// Rebuild the catalog from the registry. Returns the tool count.
    pub async fn refresh_tools(&mut self) -> usize {
        self.tools = catalog::list_tools(&self.registry).await;
        self.tools.len()
    }

    /// Run until input ends or the run is cancelled, then close the registry.
    ///
    /// The registry is closed on every exit path. An inference failure is
    /// returned in preference to a teardown failure.
    pub async fn run<I: UserInput>(mut self, input: &mut I) -> Result<Conversation> {
        let outcome = self.drive(input).await;

        let Self {
            registry,
            conversation,
            ..
        } = self;
        let closed = registry.close().await;

        match (outcome, closed) {
            (Ok(()), Ok(())) => Ok(conversation),
            (Ok(()), Err(close)) => Err(close.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                warn!(error = %close, "teardown failed after run error");
                Err(e)
            }
        }
    }

    async fn drive<I: UserInput>(&mut self, input: &mut I) -> Result<()> {
        let cancel = self.cancel.clone();
        let count = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            count = self.refresh_tools() => count,
        };
        info!(providers = self.registry.len(), tools = count, "catalog loaded");

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancelled while waiting for input");
                    return Ok(());
                }
                line = input.read_line() => line,
            };

            let text = match line {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!("end of input");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    return Ok(());
                }
            };

            match self.turn(&text).await {
                Ok(_) => {}
                Err(Error::Cancelled) => {
                    info!("turn cancelled");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve one user message, including every tool round it triggers.
    ///
    /// Returns the final assistant text, or `None` when the input is blank
    /// and was ignored.
    pub async fn turn(&mut self, text: &str) -> Result<Option<String>> {
        if text.trim().is_empty() {
            debug!("ignoring empty input");
            return Ok(None);
        }
        self.conversation.push(Message::user(text));

        loop {
            let reply = self.infer().await?;
            let calls = reply.tool_calls.clone();
            let content = reply.content.clone();
            self.conversation.push(reply);

            if calls.is_empty() {
                return Ok(Some(content));
            }
            debug!(count = calls.len(), "executing tool round");
            self.execute_tool_calls(&calls).await?;
        }
    }

    async fn infer(&self) -> Result<Message> {
        let _guard = self.inference.lock().await;
        let request = ModelRequest {
            messages: self.conversation.messages(),
            tools: &self.tools,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            reply = self.exchange(request) => reply,
        }
    }

    async fn exchange(&self, request: ModelRequest<'_>) -> Result<Message> {
        if !self.options.stream {
            let reply = self.backend.chat(request).await?;
            if !reply.content.is_empty() {
                self.observer.on_assistant(&reply.content);
            }
            return Ok(reply);
        }

        let mut fragments = self.backend.chat_stream(request).await?;
        let mut accumulator = StreamAccumulator::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if !fragment.content.is_empty() {
                self.observer.on_text(&fragment.content);
            }
            accumulator.push(fragment);
            if accumulator.is_done() {
                break;
            }
        }
        self.observer.on_stream_end();
        Ok(accumulator.finish()?)
    }

    async fn execute_tool_calls(&mut self, calls: &[ToolCall]) -> Result<()> {
        for (index, call) in calls.iter().enumerate() {
            self.observer.on_tool_call(call);
            debug!(tool = %call.name, id = %call.id, "calling tool");

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                outcome = router::invoke(&self.registry, &call.name, &call.arguments) => Some(outcome),
            };

            let Some(outcome) = outcome else {
                for skipped in &calls[index..] {
                    self.conversation
                        .push(Message::tool_result(skipped, CANCELLED_RESULT));
                }
                return Err(Error::Cancelled);
            };

            let content = match outcome {
                Ok(result) => {
                    let text = format_result(&result);
                    self.observer
                        .on_tool_result(call, &preview(&text, self.options.preview_len));
                    text
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "tool call failed");
                    self.observer.on_tool_error(call, &e);
                    format!("Error: {e}")
                }
            };
            self.conversation.push(Message::tool_result(call, content));
        }
        Ok(())
    }
}
