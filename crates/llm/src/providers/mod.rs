//! Completion provider implementations.

pub mod cortex;
pub mod ollama;

pub use cortex::CortexClient;
pub use ollama::OllamaClient;
