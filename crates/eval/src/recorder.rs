//! Recorded RAG queries with background feedback scoring.

use crate::feedback::{default_feedbacks, FeedbackDefinition};
use crate::provider::FeedbackProvider;
use crate::session::EvalSession;
use codechat_core::{AppResult, ResultExt};
use codechat_retrieval::RagApp;
use std::sync::Arc;

/// App id used when none is configured.
pub const DEFAULT_APP_ID: &str = "RAG v1";

/// Wraps a [`RagApp`] so each query is recorded and scored.
pub struct Recorder {
    app: Arc<RagApp>,
    app_id: String,
    feedbacks: Arc<Vec<FeedbackDefinition>>,
    provider: Arc<dyn FeedbackProvider>,
    session: EvalSession,
}

impl Recorder {
    /// Create a recorder with the default feedbacks and a fresh session.
    pub fn new(app: Arc<RagApp>, provider: Arc<dyn FeedbackProvider>) -> Self {
        Self {
            app,
            app_id: DEFAULT_APP_ID.to_string(),
            feedbacks: Arc::new(default_feedbacks()),
            provider,
            session: EvalSession::new(),
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_feedbacks(mut self, feedbacks: Vec<FeedbackDefinition>) -> Self {
        self.feedbacks = Arc::new(feedbacks);
        self
    }

    /// Record into an existing session instead of a fresh one.
    pub fn with_session(mut self, session: EvalSession) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &EvalSession {
        &self.session
    }

    /// Answer `query` while recording it.
    ///
    /// Feedback scoring is submitted in the background; the answer is
    /// returned without waiting for it.
    pub async fn record_and_query(&self, query: &str) -> AppResult<String> {
        self.recorded_query(query).await.wrap_err()
    }

    async fn recorded_query(&self, query: &str) -> AppResult<String> {
        let mut scope = self.session.open_scope(&self.app_id, query);
        let record_id = scope.record_id();

        let result = self.app.query(query, Some(scope.enter()?)).await;

        match result {
            Ok(answer) => {
                let record = scope.finish(&answer)?;
                self.session.submit(
                    record,
                    Arc::clone(&self.feedbacks),
                    Arc::clone(&self.provider),
                )?;
                tracing::info!(%record_id, "Recorded query submitted for feedback");
                Ok(answer)
            }
            Err(err) => {
                scope.fail(&err);
                tracing::warn!(%record_id, error = %err, "Recorded query failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordState;
    use crate::tests::mocks::{rag_app, LengthProvider};
    use codechat_core::AppError;

    #[tokio::test]
    async fn test_failed_query_closes_record() {
        let recorder = Recorder::new(rag_app(&[]), Arc::new(LengthProvider));

        let err = recorder.record_and_query("   ").await.unwrap_err();
        assert!(err.is_wrapped());
        assert!(matches!(err.root_cause(), AppError::Search(_)));

        let records = recorder.session().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, RecordState::Closed);
        assert!(records[0].error.is_some());
        assert!(records[0].main_output.is_none());

        recorder.session().wait_for_feedback().await.unwrap();
        assert_eq!(recorder.session().records()[0].state, RecordState::Closed);
    }

    #[tokio::test]
    async fn test_app_id_is_recorded() {
        let recorder =
            Recorder::new(rag_app(&["X adds"]), Arc::new(LengthProvider)).with_app_id("RAG v2");

        recorder.record_and_query("What does X do?").await.unwrap();
        recorder.session().wait_for_feedback().await.unwrap();

        assert_eq!(recorder.session().records()[0].app_id, "RAG v2");
        assert_eq!(recorder.session().leaderboard()[0].app_id, "RAG v2");
    }
}
