//! Snowflake Cortex completion provider.
//!
//! Talks to the Cortex REST inference endpoint
//! (`POST /api/v2/cortex/inference:complete`). Depending on the account and
//! request, the endpoint answers either with a single JSON object or with a
//! server-sent event stream of deltas; both are folded into one answer.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use codechat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";

#[derive(Debug, Serialize)]
struct CortexRequest<'a> {
    model: &'a str,
    messages: Vec<CortexMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CortexMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CortexResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CortexChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct CortexChoice {
    #[serde(default)]
    message: Option<CortexContent>,
    #[serde(default)]
    delta: Option<CortexContent>,
}

#[derive(Debug, Deserialize)]
struct CortexContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl CortexChoice {
    fn into_text(self) -> Option<String> {
        self.message
            .or(self.delta)
            .and_then(|c| c.content.or(c.text))
    }
}

/// Cortex LLM client.
pub struct CortexClient {
    base_url: String,
    token: String,
    token_type: String,
    client: reqwest::Client,
}

impl CortexClient {
    /// Create a client for an account base URL such as
    /// `https://myorg-myaccount.snowflakecomputing.com`.
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

    fn to_cortex_request<'a>(&self, request: &'a LlmRequest) -> CortexRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(CortexMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(CortexMessage {
            role: "user",
            content: &request.prompt,
        });

        CortexRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

/// Fold a Cortex response body (JSON or SSE) into text, model and usage.
fn parse_completion_body(body: &str) -> AppResult<(String, Option<String>, LlmUsage)> {
    let trimmed = body.trim_start();

    if !trimmed.starts_with("data:") && !trimmed.starts_with("event:") {
        let response: CortexResponse = serde_json::from_str(trimmed)
            .map_err(|e| AppError::Llm(format!("Failed to parse Cortex response: {}", e)))?;
        let content = response
            .choices
            .into_iter()
            .filter_map(CortexChoice::into_text)
            .collect::<String>();
        return Ok((content, response.model, response.usage.unwrap_or_default()));
    }

    let mut content = String::new();
    let mut model = None;
    let mut usage = LlmUsage::default();

    for line in trimmed.lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }

        let chunk: CortexResponse = serde_json::from_str(payload)
            .map_err(|e| AppError::Llm(format!("Failed to parse Cortex event: {}", e)))?;

        if model.is_none() {
            model = chunk.model;
        }
        if let Some(chunk_usage) = chunk.usage {
            usage = chunk_usage;
        }
        for choice in chunk.choices {
            if let Some(text) = choice.into_text() {
                content.push_str(&text);
            }
        }
    }

    Ok((content, model, usage))
}

#[async_trait::async_trait]
impl LlmClient for CortexClient {
    fn provider_name(&self) -> &str {
        "cortex"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Cortex");
        tracing::debug!("Request: {:?}", request);

        let url = format!("{}{}", self.base_url, COMPLETE_PATH);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(&self.to_cortex_request(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Cortex: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read Cortex response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Llm(format!(
                "Cortex API error ({}): {}",
                status, body
            )));
        }

        let (content, model, usage) = parse_completion_body(&body)?;

        tracing::info!(
            completion_tokens = usage.completion_tokens,
            "Received completion from Cortex"
        );

        Ok(LlmResponse {
            content,
            model: model.unwrap_or_else(|| request.model.clone()),
            usage,
        })
    }
}
