//! Feedback definitions and their evaluation over a record.
//!
//! A feedback is plain data: which provider function to call, where its two
//! arguments come from in the record, and how per-call scores combine.

use crate::provider::FeedbackProvider;
use crate::record::Record;
use codechat_core::{AppError, AppResult};
use codechat_retrieval::RETRIEVE_CONTEXT;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider function a feedback calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Groundedness,
    ContextRelevance,
    AnswerRelevance,
}

/// How the return values of a recorded method are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// One evaluation per returned element.
    Each,
    /// A single evaluation over all elements joined.
    Collected,
}

/// Where a feedback argument comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    MainInput,
    MainOutput,
    Returns { call: String, mode: ReturnMode },
}

/// How per-call scores combine into the feedback score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    /// Exactly one evaluation is expected.
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDefinition {
    pub name: String,
    pub kind: FeedbackKind,
    pub inputs: [Selector; 2],
    pub aggregation: Aggregation,
}

impl FeedbackDefinition {
    pub fn new(
        name: impl Into<String>,
        kind: FeedbackKind,
        inputs: [Selector; 2],
        aggregation: Aggregation,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs,
            aggregation,
        }
    }
}

/// One provider call made while evaluating a feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackCall {
    pub args: [String; 2],
    pub score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Outcome of one feedback over one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub name: String,
    pub score: Option<f32>,
    pub calls: Vec<FeedbackCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedbackResult {
    fn failed(name: &str, calls: Vec<FeedbackCall>, error: &AppError) -> Self {
        Self {
            name: name.to_string(),
            score: None,
            calls,
            error: Some(error.to_string()),
        }
    }
}

/// Groundedness, context relevance and answer relevance of a RAG record.
pub fn default_feedbacks() -> Vec<FeedbackDefinition> {
    vec![
        FeedbackDefinition::new(
            "Groundedness",
            FeedbackKind::Groundedness,
            [
                Selector::Returns {
                    call: RETRIEVE_CONTEXT.to_string(),
                    mode: ReturnMode::Collected,
                },
                Selector::MainOutput,
            ],
            Aggregation::Single,
        ),
        FeedbackDefinition::new(
            "Context Relevance",
            FeedbackKind::ContextRelevance,
            [
                Selector::MainInput,
                Selector::Returns {
                    call: RETRIEVE_CONTEXT.to_string(),
                    mode: ReturnMode::Each,
                },
            ],
            Aggregation::Mean,
        ),
        FeedbackDefinition::new(
            "Answer Relevance",
            FeedbackKind::AnswerRelevance,
            [Selector::MainInput, Selector::MainOutput],
            Aggregation::Mean,
        ),
    ]
}

/// Values `selector` picks out of `record`.
pub fn resolve(selector: &Selector, record: &Record) -> Vec<String> {
    match selector {
        Selector::MainInput => vec![record.main_input.clone()],
        Selector::MainOutput => record.main_output.iter().cloned().collect(),
        Selector::Returns { call, mode } => {
            let elements: Vec<String> = record
                .calls
                .iter()
                .filter(|c| &c.method == call)
                .flat_map(|c| flatten(&c.rets))
                .collect();

            match mode {
                ReturnMode::Each => elements,
                ReturnMode::Collected if elements.is_empty() => Vec::new(),
                ReturnMode::Collected => vec![elements.join("\n\n")],
            }
        }
    }
}

fn flatten(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Evaluate `feedback` over `record`. Failures are captured in the result.
pub async fn evaluate(
    feedback: &FeedbackDefinition,
    record: &Record,
    provider: &dyn FeedbackProvider,
) -> FeedbackResult {
    let firsts = resolve(&feedback.inputs[0], record);
    let seconds = resolve(&feedback.inputs[1], record);

    let pairs: Vec<[String; 2]> = firsts
        .iter()
        .flat_map(|a| seconds.iter().map(move |b| [a.clone(), b.clone()]))
        .collect();

    if pairs.is_empty() {
        let err = AppError::Evaluation(format!(
            "Feedback '{}' selected no values from record {}",
            feedback.name, record.record_id
        ));
        tracing::warn!(feedback = %feedback.name, "{}", err);
        return FeedbackResult::failed(&feedback.name, Vec::new(), &err);
    }

    let mut calls = Vec::with_capacity(pairs.len());
    for args in pairs {
        match call_provider(feedback.kind, &args, provider).await {
            Ok((score, reasons)) => calls.push(FeedbackCall {
                args,
                score,
                reasons,
            }),
            Err(err) => {
                tracing::warn!(feedback = %feedback.name, error = %err, "Feedback call failed");
                return FeedbackResult::failed(&feedback.name, calls, &err);
            }
        }
    }

    match aggregate(feedback.aggregation, &calls) {
        Ok(score) => FeedbackResult {
            name: feedback.name.clone(),
            score: Some(score),
            calls,
            error: None,
        },
        Err(err) => FeedbackResult::failed(&feedback.name, calls, &err),
    }
}

async fn call_provider(
    kind: FeedbackKind,
    args: &[String; 2],
    provider: &dyn FeedbackProvider,
) -> AppResult<(f32, Vec<String>)> {
    match kind {
        FeedbackKind::ContextRelevance => Ok((
            provider.context_relevance(&args[0], &args[1]).await?,
            Vec::new(),
        )),
        FeedbackKind::AnswerRelevance => {
            Ok((provider.relevance(&args[0], &args[1]).await?, Vec::new()))
        }
        FeedbackKind::Groundedness => {
            let grounded = provider.groundedness_with_reasons(&args[0], &args[1]).await?;
            Ok((grounded.score, grounded.reasons))
        }
    }
}

fn aggregate(aggregation: Aggregation, calls: &[FeedbackCall]) -> AppResult<f32> {
    match aggregation {
        Aggregation::Mean => {
            Ok(calls.iter().map(|c| c.score).sum::<f32>() / calls.len() as f32)
        }
        Aggregation::Single => match calls {
            [only] => Ok(only.score),
            _ => Err(AppError::Evaluation(format!(
                "Expected a single evaluation, got {}",
                calls.len()
            ))),
        },
    }
}
