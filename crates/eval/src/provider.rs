//! Scoring provider backed by the completion endpoint.
//!
//! Every feedback prompt asks the model for a 0-3 rating. Ratings are
//! normalized to `[0.0, 1.0]` before they leave this module.

use codechat_core::{AppError, AppResult};
use codechat_llm::{LlmClient, LlmRequest};
use codechat_prompt::{
    build_prompt, load_builtin, load_prompt, PromptDefinition, ANSWER_RELEVANCE_PROMPT_ID,
    CONTEXT_RELEVANCE_PROMPT_ID, GROUNDEDNESS_PROMPT_ID,
};
use codechat_retrieval::RelevanceScorer;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Highest rating the feedback prompts ask for.
pub const MAX_RATING: f32 = 3.0;

/// Scores produced by a groundedness check, with the model's reasoning.
#[derive(Debug, Clone, PartialEq)]
pub struct Groundedness {
    pub score: f32,
    pub reasons: Vec<String>,
}

/// Scores questions, contexts and answers against each other.
#[async_trait::async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// How relevant `context` is to `question`.
    async fn context_relevance(&self, question: &str, context: &str) -> AppResult<f32>;

    /// How relevant `response` is to `prompt`.
    async fn relevance(&self, prompt: &str, response: &str) -> AppResult<f32>;

    /// How well `statement` is supported by `source`.
    async fn groundedness_with_reasons(
        &self,
        source: &str,
        statement: &str,
    ) -> AppResult<Groundedness>;
}

/// [`FeedbackProvider`] asking an LLM to grade with the `feedback.*` prompts.
pub struct LlmFeedbackProvider {
    client: Arc<dyn LlmClient>,
    model: String,
    context_relevance: PromptDefinition,
    answer_relevance: PromptDefinition,
    groundedness: PromptDefinition,
    rating: Regex,
}

impl LlmFeedbackProvider {
    /// Create a provider using the built-in feedback prompts.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            context_relevance: load_builtin(CONTEXT_RELEVANCE_PROMPT_ID)?,
            answer_relevance: load_builtin(ANSWER_RELEVANCE_PROMPT_ID)?,
            groundedness: load_builtin(GROUNDEDNESS_PROMPT_ID)?,
            rating: rating_pattern()?,
        })
    }

    /// Create a provider preferring prompt overrides from `workspace`.
    pub fn from_workspace(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
    ) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            context_relevance: load_prompt(workspace, CONTEXT_RELEVANCE_PROMPT_ID)?,
            answer_relevance: load_prompt(workspace, ANSWER_RELEVANCE_PROMPT_ID)?,
            groundedness: load_prompt(workspace, GROUNDEDNESS_PROMPT_ID)?,
            rating: rating_pattern()?,
        })
    }

    async fn ask(&self, prompt: &PromptDefinition, variables: &[(&str, &str)]) -> AppResult<String> {
        let variables: HashMap<String, String> = variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let built = build_prompt(prompt, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model).with_temperature(0.0);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(prompt_id = %prompt.id, "Requesting feedback rating");
        Ok(self.client.complete(&request).await?.content)
    }

    async fn rate(&self, prompt: &PromptDefinition, variables: &[(&str, &str)]) -> AppResult<f32> {
        let answer = self.ask(prompt, variables).await?;
        parse_rating(&self.rating, &answer)
    }
}

#[async_trait::async_trait]
impl FeedbackProvider for LlmFeedbackProvider {
    async fn context_relevance(&self, question: &str, context: &str) -> AppResult<f32> {
        self.rate(
            &self.context_relevance,
            &[("question", question), ("context", context)],
        )
        .await
    }

    async fn relevance(&self, prompt: &str, response: &str) -> AppResult<f32> {
        self.rate(
            &self.answer_relevance,
            &[("prompt", prompt), ("response", response)],
        )
        .await
    }

    async fn groundedness_with_reasons(
        &self,
        source: &str,
        statement: &str,
    ) -> AppResult<Groundedness> {
        let sentences = split_sentences(statement);
        if sentences.is_empty() {
            return Err(AppError::Evaluation(
                "Groundedness needs a non-empty statement".to_string(),
            ));
        }

        let mut total = 0.0;
        let mut reasons = Vec::with_capacity(sentences.len());
        for sentence in &sentences {
            let answer = self
                .ask(
                    &self.groundedness,
                    &[("source", source), ("statement", sentence.as_str())],
                )
                .await?;
            total += parse_rating(&self.rating, &answer)?;
            reasons.push(format!("STATEMENT: {}\n{}", sentence, answer.trim()));
        }

        Ok(Groundedness {
            score: total / sentences.len() as f32,
            reasons,
        })
    }
}

/// Lets a [`FeedbackProvider`] drive the retrieval relevance filter.
pub struct ProviderScorer {
    provider: Arc<dyn FeedbackProvider>,
}

impl ProviderScorer {
    pub fn new(provider: Arc<dyn FeedbackProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for ProviderScorer {
    async fn context_relevance(&self, question: &str, context: &str) -> AppResult<f32> {
        self.provider.context_relevance(question, context).await
    }
}

fn rating_pattern() -> AppResult<Regex> {
    Regex::new(r"\d+").map_err(|e| AppError::Evaluation(format!("Invalid rating pattern: {}", e)))
}

/// Normalized rating from a grader answer.
///
/// Text after the last `Score:` marker wins when present; otherwise the first
/// integer in the answer is used. Ratings are clamped to `0..=3`.
pub fn parse_rating(pattern: &Regex, answer: &str) -> AppResult<f32> {
    let scope = answer
        .rfind("Score:")
        .map(|at| &answer[at + "Score:".len()..])
        .unwrap_or(answer);

    let rating = pattern
        .find(scope)
        .or_else(|| pattern.find(answer))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .ok_or_else(|| {
            AppError::Evaluation(format!("No rating found in grader answer: {:?}", answer.trim()))
        })?;

    Ok(rating.clamp(0.0, MAX_RATING) / MAX_RATING)
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let ends_sentence = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if ends_sentence || c == '\n' {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::ScriptedLlm;

    fn pattern() -> Regex {
        rating_pattern().unwrap()
    }

    #[test]
    fn test_parse_rating_normalizes() {
        assert_eq!(parse_rating(&pattern(), "3").unwrap(), 1.0);
        assert_eq!(parse_rating(&pattern(), "0").unwrap(), 0.0);
        assert!((parse_rating(&pattern(), "RELEVANCE: 2").unwrap() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rating_clamps() {
        assert_eq!(parse_rating(&pattern(), "10").unwrap(), 1.0);
    }

    #[test]
    fn test_parse_rating_prefers_score_marker() {
        let answer = "Criteria: claims 1 and 2\nSupporting Evidence: none\nScore: 0";
        assert_eq!(parse_rating(&pattern(), answer).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_rating_rejects_missing_number() {
        let err = parse_rating(&pattern(), "I cannot rate this").unwrap_err();
        assert!(matches!(err, AppError::Evaluation(_)));
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("X adds two numbers. It returns i32!\nSee lib.rs for details");
        assert_eq!(
            sentences,
            vec![
                "X adds two numbers.".to_string(),
                "It returns i32!".to_string(),
                "See lib.rs for details".to_string(),
            ]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[tokio::test]
    async fn test_context_relevance_uses_prompt_variables() {
        let llm = Arc::new(ScriptedLlm::new(&["2"]));
        let provider = LlmFeedbackProvider::new(llm.clone(), "mistral-large2").unwrap();

        let score = provider
            .context_relevance("What does X do?", "fn x() adds")
            .await
            .unwrap();

        assert!((score - 2.0 / 3.0).abs() < 1e-6);
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("QUESTION: What does X do?"));
        assert!(requests[0].prompt.contains("CONTEXT: fn x() adds"));
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_groundedness_averages_sentences() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "Criteria: adds\nSupporting Evidence: fn x adds\nScore: 3",
            "Criteria: subtracts\nSupporting Evidence: nothing\nScore: 0",
        ]));
        let provider = LlmFeedbackProvider::new(llm.clone(), "m").unwrap();

        let result = provider
            .groundedness_with_reasons("fn x adds two numbers", "X adds. X also subtracts.")
            .await
            .unwrap();

        assert!((result.score - 0.5).abs() < 1e-6);
        assert_eq!(result.reasons.len(), 2);
        assert!(result.reasons[0].starts_with("STATEMENT: X adds."));
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_scorer_delegates() {
        let llm = Arc::new(ScriptedLlm::new(&["3"]));
        let provider = Arc::new(LlmFeedbackProvider::new(llm, "m").unwrap());
        let scorer = ProviderScorer::new(provider);

        assert_eq!(scorer.context_relevance("q", "c").await.unwrap(), 1.0);
    }
}
