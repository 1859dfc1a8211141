//! Prompt system for codechat.
//!
//! This crate provides structured prompt management with:
//! - Built-in YAML prompt definitions for answering and feedback scoring
//! - Workspace overrides in `.codechat/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{
    list_prompts, load_builtin, load_prompt, PromptSource, ANSWER_PROMPT_ID,
    ANSWER_RELEVANCE_PROMPT_ID, CONTEXT_RELEVANCE_PROMPT_ID, GROUNDEDNESS_PROMPT_ID,
};
pub use types::{BuiltPrompt, PromptDefinition, PromptInputSpec, PromptOutputSpec};
