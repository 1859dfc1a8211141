//! Answer generation from a question and retrieved passages.

use codechat_core::{AppResult, ResultExt};
use codechat_llm::{LlmClient, LlmRequest};
use codechat_prompt::{build_prompt, load_builtin, PromptDefinition, ANSWER_PROMPT_ID};
use std::collections::HashMap;
use std::sync::Arc;

/// Answer returned when there is nothing to answer from.
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have enough information in the indexed code to answer that.";

/// Low temperature keeps answers close to the retrieved code.
const ANSWER_TEMPERATURE: f32 = 0.2;

/// Generates answers with the completion endpoint.
pub struct CompletionGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl CompletionGenerator {
    /// Create a generator using the built-in answer prompt.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            prompt: load_builtin(ANSWER_PROMPT_ID)?,
        })
    }

    /// Use a different answer prompt (e.g. a workspace override).
    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an answer to `query` from `context`.
    ///
    /// An empty context short-circuits to [`NO_INFORMATION_ANSWER`]; so does
    /// a blank completion.
    pub async fn generate(&self, query: &str, context: &[String]) -> AppResult<String> {
        self.generate_answer(query, context).await.wrap_err()
    }

    async fn generate_answer(&self, query: &str, context: &[String]) -> AppResult<String> {
        if context.is_empty() {
            tracing::info!("No context passages, answering without the completion endpoint");
            return Ok(NO_INFORMATION_ANSWER.to_string());
        }

        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), format_context(context));

        let built = build_prompt(&self.prompt, variables)?;

        let mut request =
            LlmRequest::new(built.user, &self.model).with_temperature(ANSWER_TEMPERATURE);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            provider = self.client.provider_name(),
            prompt_id = %built.prompt_id,
            passages = context.len(),
            "Generating completion"
        );

        let response = self.client.complete(&request).await?;

        let answer = response.content.trim();
        if answer.is_empty() {
            tracing::warn!("Completion endpoint returned an empty answer");
            return Ok(NO_INFORMATION_ANSWER.to_string());
        }

        Ok(answer.to_string())
    }
}

/// Render passages as numbered blocks for the prompt.
pub fn format_context(context: &[String]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[Passage {}]\n{}", i + 1, passage.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
