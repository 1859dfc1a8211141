//! Evaluation of recorded RAG queries.
//!
//! A [`Recorder`] records each query into an [`EvalSession`], which scores
//! the record in the background with a [`FeedbackProvider`] and aggregates
//! the results into a per-app leaderboard.

pub mod feedback;
pub mod provider;
pub mod record;
pub mod recorder;
pub mod session;


pub use feedback::{
    default_feedbacks, evaluate, Aggregation, FeedbackCall, FeedbackDefinition, FeedbackKind,
    FeedbackResult, ReturnMode, Selector,
};
pub use provider::{FeedbackProvider, Groundedness, LlmFeedbackProvider, ProviderScorer};
pub use record::{Record, RecordState};
pub use recorder::{Recorder, DEFAULT_APP_ID};
pub use session::{EvalSession, LeaderboardRow, RecordingScope};
