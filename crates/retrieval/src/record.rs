//! Call recording for observed invocations.
//!
//! A [`Recording`] is handed explicitly to the RAG app methods that should be
//! observed. Each observed call appends its arguments and return value so
//! feedback functions can later select them by method name.

use codechat_core::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Method name recorded for context retrieval.
pub const RETRIEVE_CONTEXT: &str = "retrieve_context";

/// Method name recorded for answer generation.
pub const GENERATE_COMPLETION: &str = "generate_completion";

/// One observed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCall {
    pub method: String,
    pub args: Value,
    pub rets: Value,
    pub duration_ms: u64,
}

/// Call log of one recorded invocation.
#[derive(Debug, Default, Clone)]
pub struct Recording {
    calls: Vec<RecordedCall>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call. Arguments and return value are captured as JSON.
    pub fn record<A, R>(
        &mut self,
        method: &str,
        args: &A,
        rets: &R,
        elapsed: Duration,
    ) -> AppResult<()>
    where
        A: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        self.calls.push(RecordedCall {
            method: method.to_string(),
            args: serde_json::to_value(args)?,
            rets: serde_json::to_value(rets)?,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        Ok(())
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<RecordedCall> {
        self.calls
    }

    /// Return values of every recorded call to `method`, in call order.
    pub fn returns_of<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.calls
            .iter()
            .filter(move |call| call.method == method)
            .map(|call| &call.rets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_select_returns() {
        let mut recording = Recording::new();
        let passages = vec!["a".to_string(), "b".to_string()];

        recording
            .record(
                RETRIEVE_CONTEXT,
                &serde_json::json!({"query": "q"}),
                &passages,
                Duration::from_millis(12),
            )
            .unwrap();
        recording
            .record(
                GENERATE_COMPLETION,
                &serde_json::json!({"query": "q"}),
                "answer",
                Duration::from_millis(30),
            )
            .unwrap();

        assert_eq!(recording.calls().len(), 2);
        assert_eq!(recording.calls()[0].duration_ms, 12);

        let rets: Vec<&Value> = recording.returns_of(RETRIEVE_CONTEXT).collect();
        assert_eq!(rets, vec![&serde_json::json!(["a", "b"])]);
        assert_eq!(recording.returns_of("missing").count(), 0);
    }
}
