//! Records of observed RAG invocations.

use chrono::{DateTime, Utc};
use codechat_retrieval::RecordedCall;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a record.
///
/// `Idle` until its scope is entered, `Recording` while the app runs,
/// `Closed` once the scope ends (on success or failure) and `Scored` when
/// every feedback has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Idle,
    Recording,
    Closed,
    Scored,
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordState::Idle => "idle",
            RecordState::Recording => "recording",
            RecordState::Closed => "closed",
            RecordState::Scored => "scored",
        };
        write!(f, "{}", s)
    }
}

/// Captured inputs and outputs of one recorded invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: Uuid,
    pub app_id: String,
    pub main_input: String,
    pub main_output: Option<String>,
    pub calls: Vec<RecordedCall>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub state: RecordState,
}

impl Record {
    pub fn new(app_id: impl Into<String>, main_input: impl Into<String>) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            app_id: app_id.into(),
            main_input: main_input.into(),
            main_output: None,
            calls: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            state: RecordState::Idle,
        }
    }

    /// Wall time between start and end, once the record is closed.
    pub fn latency_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}
