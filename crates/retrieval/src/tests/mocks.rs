//! In-process stand-ins for the search service, completion endpoint and scorer.

use crate::app::RagApp;
use crate::filter::{RelevanceFilter, RelevanceScorer};
use crate::generator::CompletionGenerator;
use crate::retriever::Retriever;
use crate::search::{SearchClient, SearchRequest, SearchResponse};
use codechat_core::config::SearchServiceId;
use codechat_core::{AppError, AppResult};
use codechat_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Search service returning a fixed list of `doc_text` records.
pub struct StaticSearch {
    texts: Vec<String>,
    extra_column: Option<String>,
    respect_limit: bool,
    failure: Option<String>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StaticSearch {
    pub fn new(texts: Vec<&str>) -> Self {
        Self {
            texts: texts.into_iter().map(str::to_string).collect(),
            extra_column: None,
            respect_limit: true,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut search = Self::new(vec![]);
        search.failure = Some(message.to_string());
        search
    }

    /// Return every text even when the request asks for fewer.
    pub fn ignoring_limit(mut self) -> Self {
        self.respect_limit = false;
        self
    }

    /// Append a record that only has `column`.
    pub fn with_extra_record(mut self, column: &str) -> Self {
        self.extra_column = Some(column.to_string());
        self
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchClient for StaticSearch {
    async fn search(
        &self,
        _service: &SearchServiceId,
        request: &SearchRequest,
    ) -> AppResult<SearchResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.failure {
            return Err(AppError::Search(message.clone()));
        }

        let mut results: Vec<Map<String, Value>> = self
            .texts
            .iter()
            .map(|text| {
                let mut record = Map::new();
                record.insert("doc_text".to_string(), Value::String(text.clone()));
                record
            })
            .collect();

        if let Some(column) = &self.extra_column {
            let mut record = Map::new();
            record.insert(column.clone(), Value::String("other".to_string()));
            results.push(record);
        }

        if self.respect_limit {
            results.truncate(request.limit);
        }

        Ok(SearchResponse {
            results,
            request_id: None,
        })
    }
}

/// Completion endpoint that answers with the prompt it was given.
#[derive(Default)]
pub struct EchoLlm {
    requests: Mutex<Vec<LlmRequest>>,
}

impl EchoLlm {
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for EchoLlm {
    fn provider_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(LlmResponse {
            content: request.prompt.clone(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Completion endpoint with a canned answer.
pub struct FixedLlm {
    answer: String,
}

impl FixedLlm {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for FixedLlm {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        Ok(LlmResponse {
            content: self.answer.clone(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Completion endpoint that always fails.
pub struct FailingLlm {
    message: String,
}

impl FailingLlm {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for FailingLlm {
    fn provider_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
        Err(AppError::Llm(self.message.clone()))
    }
}

/// Scores a passage by the highest score of the keywords it contains.
pub struct KeywordScorer {
    keywords: Vec<(String, f32)>,
}

impl KeywordScorer {
    pub fn new(keywords: &[(&str, f32)]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|(k, s)| (k.to_string(), *s))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for KeywordScorer {
    async fn context_relevance(&self, _question: &str, context: &str) -> AppResult<f32> {
        Ok(self
            .keywords
            .iter()
            .filter(|(keyword, _)| context.contains(keyword.as_str()))
            .map(|(_, score)| *score)
            .fold(0.0, f32::max))
    }
}

/// Scorer that always fails.
pub struct FailingScorer;

#[async_trait::async_trait]
impl RelevanceScorer for FailingScorer {
    async fn context_relevance(&self, _question: &str, _context: &str) -> AppResult<f32> {
        Err(AppError::Evaluation("scoring provider unavailable".to_string()))
    }
}

pub fn test_service() -> SearchServiceId {
    SearchServiceId {
        database: "CODE_DB".to_string(),
        schema: "PUBLIC".to_string(),
        service: "CODE_SEARCH".to_string(),
    }
}

/// Assemble a RAG app over the given stand-ins with the default limit of 4.
pub fn app_with(
    search: Arc<dyn SearchClient>,
    llm: Arc<dyn LlmClient>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
) -> RagApp {
    let retriever = Retriever::new(search, test_service(), 4).unwrap();
    let generator = CompletionGenerator::new(llm, "mistral-large2").unwrap();
    let app = RagApp::new(retriever, generator);

    match scorer {
        Some(scorer) => app.with_filter(RelevanceFilter::new(scorer)),
        None => app,
    }
}
