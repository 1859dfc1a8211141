//! The question-answering pipeline behind every command.
//!
//! Built once from configuration and passed to the command that needs it.

use codechat_core::config::{AppConfig, SearchServiceId};
use codechat_core::{AppResult, ResultExt};
use codechat_eval::{EvalSession, FeedbackProvider, LlmFeedbackProvider, ProviderScorer, Recorder};
use codechat_llm::{create_client, ClientOptions, LlmClient};
use codechat_prompt::{load_prompt, ANSWER_PROMPT_ID};
use codechat_retrieval::{
    CompletionGenerator, CortexSearchClient, RagApp, RelevanceFilter, Retriever, SearchClient,
};
use std::sync::Arc;

/// RAG app plus the recorder that evaluates it.
pub struct ChatPipeline {
    app: Arc<RagApp>,
    recorder: Recorder,
}

impl ChatPipeline {
    /// Build the pipeline against Cortex Search and the configured
    /// completion provider.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::connect(config).wrap_err()
    }

    fn connect(config: &AppConfig) -> AppResult<Self> {
        let connection = config.cortex_connection()?;
        let service = config.search_service()?;

        let search = Arc::new(CortexSearchClient::new(
            &connection.account_url,
            &connection.token,
            &connection.token_type,
        ));
        let llm = create_client(&config.provider, &ClientOptions::from_config(config))?;

        Self::assemble(config, search, llm, service)
    }

    /// Wire the pipeline over explicit search and completion clients.
    pub fn assemble(
        config: &AppConfig,
        search: Arc<dyn SearchClient>,
        llm: Arc<dyn LlmClient>,
        service: SearchServiceId,
    ) -> AppResult<Self> {
        tracing::debug!(
            service = %service.service,
            limit = config.search.limit,
            threshold = config.retrieval.relevance_threshold,
            "Assembling chat pipeline"
        );

        let retriever =
            Retriever::new(search, service, config.search.limit)?.with_column(&config.search.column);

        let generator = CompletionGenerator::new(Arc::clone(&llm), &config.model)?
            .with_prompt(load_prompt(&config.workspace, ANSWER_PROMPT_ID)?);

        let provider: Arc<dyn FeedbackProvider> = Arc::new(LlmFeedbackProvider::from_workspace(
            llm,
            &config.model,
            &config.workspace,
        )?);

        let filter = RelevanceFilter::new(Arc::new(ProviderScorer::new(Arc::clone(&provider))))
            .with_threshold(config.retrieval.relevance_threshold);

        let app = Arc::new(RagApp::new(retriever, generator).with_filter(filter));
        let recorder = Recorder::new(Arc::clone(&app), provider);

        Ok(Self { app, recorder })
    }

    /// Answer `query`, recording and scoring it when `evaluate` is set.
    pub async fn run(&self, query: &str, evaluate: bool) -> AppResult<String> {
        if evaluate {
            self.recorder.record_and_query(query).await
        } else {
            self.app.query(query, None).await.wrap_err()
        }
    }

    pub fn session(&self) -> &EvalSession {
        self.recorder.session()
    }
}
