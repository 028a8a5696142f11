//! Inference backends.

mod ollama;

pub use ollama::{DEFAULT_HOST, OllamaBackend, OllamaBackendBuilder};
