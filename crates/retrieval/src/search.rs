//! Search service client.
//!
//! Wraps the Cortex Search REST endpoint:
//! `POST /api/v2/databases/{db}/schemas/{schema}/cortex-search-services/{service}:query`.

use codechat_core::config::SearchServiceId;
use codechat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// Columns projected into each result record
    pub columns: Vec<String>,

    /// Maximum number of results
    pub limit: usize,
}

/// Body of a search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Result records in service ranking order
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Trait for search backends.
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    /// Issue one search request against `service`.
    async fn search(
        &self,
        service: &SearchServiceId,
        request: &SearchRequest,
    ) -> AppResult<SearchResponse>;
}

/// Cortex Search REST client.
pub struct CortexSearchClient {
    base_url: String,
    token: String,
    token_type: String,
    client: reqwest::Client,
}

impl CortexSearchClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            token_type: token_type.into(),
            client: reqwest::Client::new(),
        }
    }

    fn query_url(&self, service: &SearchServiceId) -> String {
        format!(
            "{}/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            self.base_url, service.database, service.schema, service.service
        )
    }
}

#[async_trait::async_trait]
impl SearchClient for CortexSearchClient {
    async fn search(
        &self,
        service: &SearchServiceId,
        request: &SearchRequest,
    ) -> AppResult<SearchResponse> {
        let url = self.query_url(service);
        tracing::debug!(%url, limit = request.limit, "Querying Cortex Search");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Failed to send search request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Search(format!(
                "Cortex Search API error ({}): {}",
                status, error_text
            )));
        }

        let search_response: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

        tracing::debug!(
            results = search_response.results.len(),
            request_id = ?search_response.request_id,
            "Cortex Search responded"
        );

        Ok(search_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service() -> SearchServiceId {
        SearchServiceId {
            database: "CODE_DB".to_string(),
            schema: "PUBLIC".to_string(),
            service: "CODE_SEARCH".to_string(),
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            query: "What does add do?".to_string(),
            columns: vec!["doc_text".to_string()],
            limit: 4,
        }
    }

    #[tokio::test]
    async fn test_search_sends_projection_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/api/v2/databases/CODE_DB/schemas/PUBLIC/cortex-search-services/CODE_SEARCH:query",
            ))
            .and(header("Authorization", "Bearer pat"))
            .and(body_json(serde_json::json!({
                "query": "What does add do?",
                "columns": ["doc_text"],
                "limit": 4
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"doc_text": "fn add(a: i32, b: i32) -> i32 { a + b }"},
                    {"doc_text": "add is used by the calculator"}
                ],
                "request_id": "abc-123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CortexSearchClient::new(server.uri(), "pat", "PROGRAMMATIC_ACCESS_TOKEN");
        let response = client.search(&service(), &request()).await.unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.request_id.as_deref(), Some("abc-123"));
        assert_eq!(
            response.results[1]["doc_text"],
            serde_json::json!("add is used by the calculator")
        );
    }

    #[tokio::test]
    async fn test_search_without_results_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = CortexSearchClient::new(server.uri(), "pat", "PROGRAMMATIC_ACCESS_TOKEN");
        let response = client.search(&service(), &request()).await.unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("service does not exist"))
            .mount(&server)
            .await;

        let client = CortexSearchClient::new(server.uri(), "pat", "PROGRAMMATIC_ACCESS_TOKEN");
        let err = client.search(&service(), &request()).await.unwrap_err();

        match err {
            AppError::Search(msg) => assert!(msg.contains("service does not exist")),
            other => panic!("Expected search error, got {:?}", other),
        }
    }
}
