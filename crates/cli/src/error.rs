//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Anything that makes the binary exit with status 1.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The server configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The agent run failed.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// Closing server sessions failed.
    #[error(transparent)]
    Close(#[from] runtime::CloseError),
}

pub type Result<T> = std::result::Result<T, Error>;
