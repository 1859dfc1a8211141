//! Passage retrieval from the search service.

use crate::search::{SearchClient, SearchRequest};
use codechat_core::config::{SearchServiceId, DEFAULT_SEARCH_COLUMN};
use codechat_core::{AppError, AppResult, ResultExt};
use std::sync::Arc;

/// Retrieves passage texts for a query from one search service.
///
/// Every request asks for exactly `limit` results with only the
/// document-text column projected. The returned set keeps the service's
/// ranking and never holds more than `limit` passages.
pub struct Retriever {
    client: Arc<dyn SearchClient>,
    service: SearchServiceId,
    column: String,
    limit: usize,
}

impl Retriever {
    /// Create a retriever. `limit` must be greater than zero.
    pub fn new(
        client: Arc<dyn SearchClient>,
        service: SearchServiceId,
        limit: usize,
    ) -> AppResult<Self> {
        if limit == 0 {
            return Err(AppError::Search(
                "Retrieval limit must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client,
            service,
            column: DEFAULT_SEARCH_COLUMN.to_string(),
            limit,
        })
    }

    /// Project a different document-text column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Retrieve up to `limit` passages for `query`.
    pub async fn retrieve(&self, query: &str) -> AppResult<Vec<String>> {
        self.retrieve_passages(query).await.wrap_err()
    }

    async fn retrieve_passages(&self, query: &str) -> AppResult<Vec<String>> {
        if query.trim().is_empty() {
            return Err(AppError::Search("Query cannot be empty".to_string()));
        }

        tracing::info!(
            service = %self.service.service,
            limit = self.limit,
            "Retrieving passages"
        );

        let request = SearchRequest {
            query: query.to_string(),
            columns: vec![self.column.clone()],
            limit: self.limit,
        };

        let response = self.client.search(&self.service, &request).await?;

        let mut passages = Vec::with_capacity(response.results.len().min(self.limit));
        for record in response.results {
            match record.get(&self.column).and_then(|value| value.as_str()) {
                Some(text) => passages.push(text.to_string()),
                None => tracing::warn!(
                    column = %self.column,
                    "Search result without a text column, skipping"
                ),
            }
        }
        passages.truncate(self.limit);

        tracing::info!("Retrieved {} passages", passages.len());

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::StaticSearch;

    fn service() -> SearchServiceId {
        SearchServiceId {
            database: "CODE_DB".to_string(),
            schema: "PUBLIC".to_string(),
            service: "CODE_SEARCH".to_string(),
        }
    }

    #[test]
    fn test_zero_limit_rejected() {
        let search = Arc::new(StaticSearch::new(vec![]));
        assert!(Retriever::new(search, service(), 0).is_err());
    }

    #[tokio::test]
    async fn test_request_shape() {
        let search = Arc::new(StaticSearch::new(vec!["X adds two numbers."]));
        let retriever = Retriever::new(search.clone(), service(), 4).unwrap();

        let passages = retriever.retrieve("What does function X do?").await.unwrap();
        assert_eq!(passages, vec!["X adds two numbers.".to_string()]);

        let requests = search.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, 4);
        assert_eq!(requests[0].columns, vec!["doc_text".to_string()]);
        assert_eq!(requests[0].query, "What does function X do?");
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let texts = vec!["a", "b", "c", "d", "e", "f", "g"];
        for limit in 1..=6 {
            let search = Arc::new(StaticSearch::new(texts.clone()).ignoring_limit());
            let retriever = Retriever::new(search, service(), limit).unwrap();

            let passages = retriever.retrieve("letters").await.unwrap();
            assert!(passages.len() <= limit, "limit {} returned {}", limit, passages.len());
            assert_eq!(passages[0], "a");
        }
    }

    #[tokio::test]
    async fn test_empty_results() {
        let search = Arc::new(StaticSearch::new(vec![]));
        let retriever = Retriever::new(search, service(), 4).unwrap();

        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_without_column_are_skipped() {
        let search = Arc::new(StaticSearch::new(vec!["kept"]).with_extra_record("other_column"));
        let retriever = Retriever::new(search, service(), 4).unwrap();

        assert_eq!(retriever.retrieve("q").await.unwrap(), vec!["kept".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_query_is_wrapped_error() {
        let search = Arc::new(StaticSearch::new(vec!["unused"]));
        let retriever = Retriever::new(search.clone(), service(), 4).unwrap();

        let err = retriever.retrieve("   ").await.unwrap_err();
        assert!(err.is_wrapped());
        assert!(matches!(err.root_cause(), AppError::Search(_)));
        assert!(search.requests().is_empty());
    }

    #[tokio::test]
    async fn test_service_failure_is_wrapped() {
        let search = Arc::new(StaticSearch::failing("connection reset"));
        let retriever = Retriever::new(search, service(), 4).unwrap();

        let err = retriever.retrieve("q").await.unwrap_err();
        assert!(err.is_wrapped());
        assert!(err.location().unwrap().file.ends_with("retriever.rs"));
        assert!(err.to_string().contains("connection reset"));
    }
}
