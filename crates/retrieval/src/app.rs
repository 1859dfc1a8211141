//! Retrieve-then-generate orchestration.

use crate::filter::RelevanceFilter;
use crate::generator::CompletionGenerator;
use crate::record::{Recording, GENERATE_COMPLETION, RETRIEVE_CONTEXT};
use crate::retriever::Retriever;
use codechat_core::{AppResult, ResultExt};
use std::time::Instant;

/// The RAG app: retrieval, relevance gate and answer generation.
///
/// Each public method takes an optional [`Recording`]; when given, the call
/// is appended to it for later feedback scoring.
pub struct RagApp {
    retriever: Retriever,
    filter: Option<RelevanceFilter>,
    generator: CompletionGenerator,
}

impl RagApp {
    pub fn new(retriever: Retriever, generator: CompletionGenerator) -> Self {
        Self {
            retriever,
            filter: None,
            generator,
        }
    }

    /// Gate retrieved passages through `filter` before generation.
    pub fn with_filter(mut self, filter: RelevanceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Retrieve passages for `query` and apply the relevance gate.
    pub async fn retrieve_context(
        &self,
        query: &str,
        recording: Option<&mut Recording>,
    ) -> AppResult<Vec<String>> {
        let started = Instant::now();

        let passages = self.retriever.retrieve(query).await?;
        let passages = match &self.filter {
            Some(filter) => filter.apply(query, passages).await?,
            None => passages,
        };

        if let Some(recording) = recording {
            recording
                .record(
                    RETRIEVE_CONTEXT,
                    &serde_json::json!({ "query": query }),
                    &passages,
                    started.elapsed(),
                )
                .wrap_err()?;
        }

        Ok(passages)
    }

    /// Generate an answer to `query` from `context`.
    pub async fn generate_completion(
        &self,
        query: &str,
        context: &[String],
        recording: Option<&mut Recording>,
    ) -> AppResult<String> {
        let started = Instant::now();

        let answer = self.generator.generate(query, context).await?;

        if let Some(recording) = recording {
            recording
                .record(
                    GENERATE_COMPLETION,
                    &serde_json::json!({ "query": query, "context": context }),
                    &answer,
                    started.elapsed(),
                )
                .wrap_err()?;
        }

        Ok(answer)
    }

    /// Answer `query`: retrieve context, then generate from it.
    pub async fn query(&self, query: &str, mut recording: Option<&mut Recording>) -> AppResult<String> {
        tracing::info!("Answering query");

        let context = self
            .retrieve_context(query, recording.as_deref_mut())
            .await?;
        self.generate_completion(query, &context, recording).await
    }
}
