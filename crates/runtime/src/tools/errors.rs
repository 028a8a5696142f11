use std::fmt;

use thiserror::Error;

/// Why a tool call could not be routed or executed.
///
/// These are recoverable: the agent reports them back to the model as the
/// tool's output.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid tool name format: {0}")]
    InvalidName(String),

    #[error("server {0} not found")]
    UnknownProvider(String),

    #[error("failed to call tool {tool} on server {provider}: {message}")]
    Execution {
        provider: String,
        tool: String,
        message: String,
    },
}

/// Sessions that failed to shut down cleanly.
#[derive(Debug)]
pub struct CloseError {
    pub failures: Vec<(String, mcp::Error)>,
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to close {} session(s)", self.failures.len())?;
        for (i, (name, error)) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{name}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {}
