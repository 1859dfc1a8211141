//! Relevance gate over retrieved passages.
//!
//! The whole passage set is scored against the query as one aggregate (the
//! mean context relevance of its passages). A set that clears the threshold
//! passes untouched. Otherwise it is replaced by the passages that clear
//! the threshold on their own, in their original order. Passages are only
//! ever removed, and filtering an already-filtered set changes nothing.

use codechat_core::config::DEFAULT_RELEVANCE_THRESHOLD;
use codechat_core::{AppResult, ResultExt};
use std::sync::Arc;

/// Scores how relevant a passage is to a question, in `[0.0, 1.0]`.
#[async_trait::async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn context_relevance(&self, question: &str, context: &str) -> AppResult<f32>;
}

/// Threshold gate driven by a [`RelevanceScorer`].
pub struct RelevanceFilter {
    scorer: Arc<dyn RelevanceScorer>,
    threshold: f32,
}

impl RelevanceFilter {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            scorer,
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Filter with the configured threshold.
    pub async fn apply(&self, query: &str, passages: Vec<String>) -> AppResult<Vec<String>> {
        self.filter(query, passages, self.threshold).await
    }

    /// Filter `passages` for `query` against an explicit `threshold`.
    pub async fn filter(
        &self,
        query: &str,
        passages: Vec<String>,
        threshold: f32,
    ) -> AppResult<Vec<String>> {
        self.filter_passages(query, passages, threshold)
            .await
            .wrap_err()
    }

    async fn filter_passages(
        &self,
        query: &str,
        passages: Vec<String>,
        threshold: f32,
    ) -> AppResult<Vec<String>> {
        if passages.is_empty() {
            return Ok(passages);
        }

        let mut scores = Vec::with_capacity(passages.len());
        for passage in &passages {
            scores.push(self.scorer.context_relevance(query, passage).await?);
        }

        let aggregate = mean(&scores);
        tracing::debug!(aggregate, threshold, "Scored passage set");

        if aggregate >= threshold {
            return Ok(passages);
        }

        let kept: Vec<String> = passages
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score >= threshold)
            .map(|(passage, _)| passage)
            .collect();

        tracing::info!(
            aggregate,
            threshold,
            kept = kept.len(),
            "Passage set below relevance threshold, keeping individually relevant passages"
        );

        Ok(kept)
    }
}

fn mean(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f32>() / scores.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::{FailingScorer, KeywordScorer};
    use codechat_core::AppError;

    fn passages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_relevant_set_passes_unchanged() {
        let filter = RelevanceFilter::new(Arc::new(KeywordScorer::new(&[
            ("parser", 0.9),
            ("lexer", 0.4),
        ])));

        let input = passages(&["the parser module", "the lexer module"]);
        let output = filter.apply("parser", input.clone()).await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_irrelevant_set_keeps_only_relevant_passages() {
        let filter = RelevanceFilter::new(Arc::new(KeywordScorer::new(&[
            ("parser", 0.9),
            ("logo", 0.0),
            ("readme", 0.1),
        ])));

        let input = passages(&["logo.png bytes", "parser entry point", "readme badge"]);
        let output = filter.apply("parser", input).await.unwrap();
        assert_eq!(output, passages(&["parser entry point"]));
    }

    #[tokio::test]
    async fn test_filter_never_adds_and_is_idempotent() {
        let filter = RelevanceFilter::new(Arc::new(KeywordScorer::new(&[
            ("a", 0.8),
            ("b", 0.1),
            ("c", 0.2),
            ("d", 0.6),
        ])));

        let input = passages(&["a", "b", "c", "d"]);
        for threshold in [0.0, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let once = filter.filter("q", input.clone(), threshold).await.unwrap();
            assert!(once.len() <= input.len());
            assert!(once.iter().all(|p| input.contains(p)));

            let twice = filter.filter("q", once.clone(), threshold).await.unwrap();
            assert_eq!(once, twice, "threshold {}", threshold);
        }
    }

    #[tokio::test]
    async fn test_empty_set_is_not_scored() {
        let filter = RelevanceFilter::new(Arc::new(FailingScorer));
        let output = filter.apply("q", Vec::new()).await.unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_scorer_failure_is_wrapped() {
        let filter = RelevanceFilter::new(Arc::new(FailingScorer));
        let err = filter.apply("q", passages(&["x"])).await.unwrap_err();

        assert!(err.is_wrapped());
        assert!(matches!(err.root_cause(), AppError::Evaluation(_)));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[0.25, 0.75]) - 0.5).abs() < f32::EPSILON);
    }
}
