//! LLM integration crate for codechat.
//!
//! This crate provides a provider-agnostic abstraction over the completion
//! endpoint used to answer questions and to score feedback.
//!
//! # Providers
//! - **Cortex**: Snowflake Cortex REST inference (default)
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use codechat_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, ClientOptions};
pub use providers::{CortexClient, OllamaClient};
pub use types::ProviderType;
