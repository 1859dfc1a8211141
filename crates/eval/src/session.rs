//! In-memory evaluation session: records, feedback results and leaderboard.

use crate::feedback::{evaluate, FeedbackDefinition, FeedbackResult};
use crate::provider::FeedbackProvider;
use crate::record::{Record, RecordState};
use chrono::Utc;
use codechat_core::{AppError, AppResult};
use codechat_retrieval::Recording;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    records: Vec<Record>,
    feedback: HashMap<Uuid, Vec<FeedbackResult>>,
}

impl Store {
    fn upsert(&mut self, record: Record) {
        match self
            .records
            .iter_mut()
            .find(|r| r.record_id == record.record_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}

/// Per-app aggregate over scored records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub app_id: String,
    pub records: usize,
    /// Mean score per feedback name.
    pub metrics: BTreeMap<String, f32>,
    pub mean_latency_ms: f64,
}

/// Shared store of records plus the scoring tasks still running.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone, Default)]
pub struct EvalSession {
    store: Arc<Mutex<Store>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EvalSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a record for `app_id`. The scope stays idle until entered.
    pub fn open_scope(&self, app_id: &str, main_input: &str) -> RecordingScope<'_> {
        RecordingScope {
            session: self,
            record: Record::new(app_id, main_input),
            recording: Recording::new(),
        }
    }

    /// Store a closed record and score it in the background.
    pub fn submit(
        &self,
        record: Record,
        feedbacks: Arc<Vec<FeedbackDefinition>>,
        provider: Arc<dyn FeedbackProvider>,
    ) -> AppResult<()> {
        if record.state != RecordState::Closed {
            return Err(AppError::Evaluation(format!(
                "Record {} is {}, only closed records can be scored",
                record.record_id, record.state
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            AppError::Evaluation(format!("Feedback scoring needs a tokio runtime: {}", e))
        })?;

        self.store().upsert(record.clone());

        let store = Arc::clone(&self.store);
        let handle = runtime.spawn(async move {
            let mut results = Vec::with_capacity(feedbacks.len());
            for feedback in feedbacks.iter() {
                results.push(evaluate(feedback, &record, provider.as_ref()).await);
            }

            tracing::info!(
                record_id = %record.record_id,
                feedbacks = results.len(),
                "Feedback scoring finished"
            );

            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            store.feedback.insert(record.record_id, results);
            if let Some(stored) = store
                .records
                .iter_mut()
                .find(|r| r.record_id == record.record_id)
            {
                stored.state = RecordState::Scored;
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        Ok(())
    }

    /// Wait until every submitted record has been scored.
    pub async fn wait_for_feedback(&self) -> AppResult<()> {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(
                &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if handles.is_empty() {
                return Ok(());
            }

            for handle in handles {
                handle.await.map_err(|e| {
                    AppError::Evaluation(format!("Feedback scoring task failed: {}", e))
                })?;
            }
        }
    }

    /// Every record in submission order.
    pub fn records(&self) -> Vec<Record> {
        self.store().records.clone()
    }

    pub fn record(&self, record_id: Uuid) -> Option<Record> {
        self.store()
            .records
            .iter()
            .find(|r| r.record_id == record_id)
            .cloned()
    }

    /// Feedback results of a record; empty until it is scored.
    pub fn feedback(&self, record_id: Uuid) -> Vec<FeedbackResult> {
        self.store()
            .feedback
            .get(&record_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mean of each feedback score and of latency, per app.
    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let store = self.store();

        let mut by_app: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in &store.records {
            if matches!(record.state, RecordState::Closed | RecordState::Scored) {
                by_app.entry(record.app_id.as_str()).or_default().push(record);
            }
        }

        by_app
            .into_iter()
            .map(|(app_id, records)| {
                let mut sums: BTreeMap<String, (f32, usize)> = BTreeMap::new();
                for record in &records {
                    for result in store.feedback.get(&record.record_id).into_iter().flatten() {
                        if let Some(score) = result.score {
                            let entry = sums.entry(result.name.clone()).or_insert((0.0, 0));
                            entry.0 += score;
                            entry.1 += 1;
                        }
                    }
                }

                let latencies: Vec<i64> = records.iter().filter_map(|r| r.latency_ms()).collect();
                let mean_latency_ms = if latencies.is_empty() {
                    0.0
                } else {
                    latencies.iter().sum::<i64>() as f64 / latencies.len() as f64
                };

                LeaderboardRow {
                    app_id: app_id.to_string(),
                    records: records.len(),
                    metrics: sums
                        .into_iter()
                        .map(|(name, (sum, count))| (name, sum / count as f32))
                        .collect(),
                    mean_latency_ms,
                }
            })
            .collect()
    }
}

/// An open record and the call log handed to the app.
///
/// A scope that is dropped while recording is closed with an error, so a
/// record never stays in `Recording` past its scope.
pub struct RecordingScope<'a> {
    session: &'a EvalSession,
    record: Record,
    recording: Recording,
}

impl RecordingScope<'_> {
    pub fn record_id(&self) -> Uuid {
        self.record.record_id
    }

    pub fn state(&self) -> RecordState {
        self.record.state
    }

    /// Start recording and hand out the call log.
    pub fn enter(&mut self) -> AppResult<&mut Recording> {
        if self.record.state != RecordState::Idle {
            return Err(AppError::Evaluation(format!(
                "Cannot enter a scope that is {}",
                self.record.state
            )));
        }

        self.record.state = RecordState::Recording;
        self.session.store().upsert(self.record.clone());
        tracing::debug!(record_id = %self.record.record_id, "Recording started");
        Ok(&mut self.recording)
    }

    /// Close the scope with the app's answer.
    pub fn finish(mut self, main_output: &str) -> AppResult<Record> {
        if self.record.state != RecordState::Recording {
            return Err(AppError::Evaluation(format!(
                "Cannot finish a scope that is {}",
                self.record.state
            )));
        }

        self.record.main_output = Some(main_output.to_string());
        Ok(self.close())
    }

    /// Close the scope after the app failed.
    pub fn fail(mut self, error: &AppError) -> Record {
        self.record.error = Some(error.to_string());
        self.close()
    }

    fn close(&mut self) -> Record {
        self.record.calls = std::mem::take(&mut self.recording).into_calls();
        self.record.ended_at = Some(Utc::now());
        self.record.state = RecordState::Closed;
        self.session.store().upsert(self.record.clone());
        tracing::debug!(record_id = %self.record.record_id, "Recording closed");
        self.record.clone()
    }
}

impl Drop for RecordingScope<'_> {
    fn drop(&mut self) {
        if self.record.state == RecordState::Recording {
            self.record.error = Some("Recording scope dropped before completion".to_string());
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::default_feedbacks;
    use crate::tests::mocks::{sample_record, LengthProvider};

    #[test]
    fn test_scope_lifecycle() {
        let session = EvalSession::new();
        let mut scope = session.open_scope("RAG v1", "q");
        assert_eq!(scope.state(), RecordState::Idle);
        assert!(session.records().is_empty());

        scope.enter().unwrap();
        assert_eq!(scope.state(), RecordState::Recording);
        assert!(scope.enter().is_err());
        assert_eq!(session.records()[0].state, RecordState::Recording);

        let record = scope.finish("answer").unwrap();
        assert_eq!(record.state, RecordState::Closed);
        assert_eq!(record.main_output.as_deref(), Some("answer"));
        assert!(record.ended_at.is_some());
        assert_eq!(session.records()[0].state, RecordState::Closed);
    }

    #[test]
    fn test_dropped_scope_is_closed() {
        let session = EvalSession::new();
        {
            let mut scope = session.open_scope("RAG v1", "q");
            scope.enter().unwrap();
        }

        let records = session.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, RecordState::Closed);
        assert!(records[0].error.as_deref().unwrap().contains("dropped"));
    }

    #[test]
    fn test_idle_scope_drop_leaves_nothing() {
        let session = EvalSession::new();
        drop(session.open_scope("RAG v1", "q"));
        assert!(session.records().is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_closed_record() {
        let session = EvalSession::new();
        let mut record = sample_record(&["a"], Some("answer"));
        record.state = RecordState::Recording;

        let result = session.submit(
            record,
            Arc::new(default_feedbacks()),
            Arc::new(LengthProvider),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_submit_scores_record() {
        let session = EvalSession::new();
        let record = sample_record(&["ab", "abcd"], Some("answer"));
        let id = record.record_id;

        session
            .submit(record, Arc::new(default_feedbacks()), Arc::new(LengthProvider))
            .unwrap();
        session.wait_for_feedback().await.unwrap();

        assert_eq!(session.record(id).unwrap().state, RecordState::Scored);
        let feedback = session.feedback(id);
        assert_eq!(feedback.len(), 3);
        assert!(feedback.iter().all(|f| f.score.is_some()));
    }

    #[tokio::test]
    async fn test_leaderboard_averages_per_app() {
        let session = EvalSession::new();
        let feedbacks = Arc::new(default_feedbacks());

        // Context relevance: 0.2 for the first record, 0.4 for the second.
        for passage in ["ab", "abcd"] {
            let mut record = sample_record(&[passage], Some("answer"));
            record.ended_at = Some(record.started_at + chrono::Duration::milliseconds(100));
            session
                .submit(record, Arc::clone(&feedbacks), Arc::new(LengthProvider))
                .unwrap();
        }
        session.wait_for_feedback().await.unwrap();

        let board = session.leaderboard();
        assert_eq!(board.len(), 1);

        let row = &board[0];
        assert_eq!(row.app_id, "RAG v1");
        assert_eq!(row.records, 2);
        assert!((row.metrics["Context Relevance"] - 0.3).abs() < 1e-6);
        assert!((row.metrics["Answer Relevance"] - 0.5).abs() < 1e-6);
        assert!((row.metrics["Groundedness"] - 1.0).abs() < 1e-6);
        assert!((row.mean_latency_ms - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_not_kept() {
        let session = EvalSession::new();
        let feedbacks = Arc::new(default_feedbacks());

        for _ in 0..3 {
            let record = sample_record(&["ab"], Some("answer"));
            session
                .submit(record, Arc::clone(&feedbacks), Arc::new(LengthProvider))
                .unwrap();

            while !session.pending.lock().unwrap().iter().all(|h| h.is_finished()) {
                tokio::task::yield_now().await;
            }
        }

        assert_eq!(session.pending.lock().unwrap().len(), 1);
        session.wait_for_feedback().await.unwrap();
        assert_eq!(session.records().len(), 3);
        assert!(session.records().iter().all(|r| r.state == RecordState::Scored));
    }

    #[tokio::test]
    async fn test_wait_without_pending_returns() {
        EvalSession::new().wait_for_feedback().await.unwrap();
    }
}
