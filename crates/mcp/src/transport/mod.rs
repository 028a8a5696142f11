//! Transport bindings: one bidirectional message channel per server.

mod sse;
mod stdio;

pub use sse::{SseEvent, SseEventParser, SseTransport};
pub use stdio::StdioTransport;

use std::collections::HashMap;

use tokio_util::codec::LinesCodecError;

use crate::error::{Error, Result};

/// Maximum size of a single inbound message (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Map a line-decoding failure; an oversized line reports one byte past the limit.
fn line_error(e: LinesCodecError) -> Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => Error::MessageTooLarge {
            size: MAX_MESSAGE_SIZE + 1,
            max: MAX_MESSAGE_SIZE,
        },
        LinesCodecError::Io(e) => Error::Io(e),
    }
}

/// How to reach a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawn a subprocess and speak newline-delimited JSON over its stdio.
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Connect to an HTTP event stream and post messages back.
    Sse {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl TransportConfig {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Sse { .. } => "sse",
        }
    }
}

/// A bound transport.
pub enum Transport {
    Stdio(StdioTransport),
    Sse(SseTransport),
}

impl Transport {
    /// Open the channel described by `config`.
    pub async fn bind(config: &TransportConfig) -> Result<Self> {
        match config {
            TransportConfig::Stdio { command, args, env } => {
                Ok(Self::Stdio(StdioTransport::spawn(command, args, env)?))
            }
            TransportConfig::Sse { url, headers } => {
                Ok(Self::Sse(SseTransport::connect(url, headers).await?))
            }
        }
    }

    /// Send one serialized JSON-RPC message.
    pub async fn send(&self, message: &str) -> Result<()> {
        match self {
            Self::Stdio(t) => t.send(message).await,
            Self::Sse(t) => t.send(message).await,
        }
    }

    /// Receive the next serialized JSON-RPC message.
    pub async fn recv(&self) -> Result<String> {
        match self {
            Self::Stdio(t) => t.recv().await,
            Self::Sse(t) => t.recv().await,
        }
    }

    /// Tear down the channel.
    pub async fn close(self) -> Result<()> {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Sse(t) => {
                t.close();
                Ok(())
            }
        }
    }
}
