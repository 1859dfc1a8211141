//! Retrieval-augmented answering over indexed source code.
//!
//! The flow is linear: [`Retriever`] fetches passages from the search
//! service, [`RelevanceFilter`] gates them by relevance, and
//! [`CompletionGenerator`] answers from what survives. [`RagApp`] ties the
//! three together and records calls into an optional [`Recording`].

pub mod app;
pub mod filter;
pub mod generator;
pub mod record;
pub mod retriever;
pub mod search;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use app::RagApp;
pub use filter::{RelevanceFilter, RelevanceScorer};
pub use generator::{format_context, CompletionGenerator, NO_INFORMATION_ANSWER};
pub use record::{RecordedCall, Recording, GENERATE_COMPLETION, RETRIEVE_CONTEXT};
pub use retriever::Retriever;
pub use search::{CortexSearchClient, SearchClient, SearchRequest, SearchResponse};
