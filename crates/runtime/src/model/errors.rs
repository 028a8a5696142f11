use thiserror::Error;

/// Failures of a single inference exchange. Any of these ends the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The backend could not be reached, or the connection dropped.
    #[error("network: {0}")]
    Network(String),

    /// Non-success status, or an `error` field in the body.
    #[error("provider api: {0}")]
    Api(String),

    /// The body (or a stream line) was not the expected shape.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// A streamed reply ended without its completion signal.
    #[error("stream ended before completion")]
    Incomplete,
}
