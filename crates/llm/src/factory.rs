//! LLM provider factory.
//!
//! Builds the completion client for the configured provider, injecting
//! endpoint and credentials resolved from application configuration.

use crate::client::LlmClient;
use crate::providers::{CortexClient, OllamaClient};
use crate::types::ProviderType;
use codechat_core::config::{AppConfig, DEFAULT_TOKEN_TYPE};
use codechat_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Connection settings handed to [`create_client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Base URL override (Ollama endpoint or Snowflake account URL)
    pub endpoint: Option<String>,

    /// Bearer token (required by Cortex)
    pub api_key: Option<String>,

    /// Snowflake token type header value
    pub token_type: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl ClientOptions {
    /// Resolve options for the active provider of `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.provider_endpoint(),
            api_key: config.snowflake.token.clone(),
            token_type: Some(config.snowflake.token_type.clone()),
            timeout_secs: config.provider_timeout(),
        }
    }
}

/// Create an LLM client based on the provider name.
///
/// # Errors
/// Returns a configuration error if:
/// - Provider is unknown
/// - Required endpoint or secrets are missing
pub fn create_client(provider: &str, options: &ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    tracing::debug!(provider = provider_type.as_str(), "Creating LLM client");

    match provider_type {
        ProviderType::Ollama => {
            let base_url = options
                .endpoint
                .as_deref()
                .unwrap_or("http://localhost:11434");
            let mut client = OllamaClient::with_base_url(base_url);
            if let Some(secs) = options.timeout_secs {
                client = client.with_timeout(Duration::from_secs(secs))?;
            }
            Ok(Arc::new(client))
        }
        ProviderType::Cortex => {
            let base_url = options.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("Cortex provider requires a Snowflake account URL".to_string())
            })?;
            let token = options.api_key.as_deref().ok_or_else(|| {
                AppError::Config("Cortex provider requires API key".to_string())
            })?;
            let token_type = options.token_type.as_deref().unwrap_or(DEFAULT_TOKEN_TYPE);
            Ok(Arc::new(CortexClient::new(base_url, token, token_type)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", &ClientOptions::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_timeout() {
        let options = ClientOptions {
            endpoint: Some("http://localhost:8080".to_string()),
            timeout_secs: Some(5),
            ..Default::default()
        };
        assert!(create_client("ollama", &options).is_ok());
    }

    #[test]
    fn test_cortex_requires_api_key() {
        let options = ClientOptions {
            endpoint: Some("https://acct.snowflakecomputing.com".to_string()),
            ..Default::default()
        };
        match create_client("cortex", &options) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires API key")),
            Err(other) => panic!("Unexpected error: {:?}", other),
            Ok(_) => panic!("Expected error for Cortex without API key"),
        }
    }

    #[test]
    fn test_cortex_requires_endpoint() {
        let options = ClientOptions {
            api_key: Some("token".to_string()),
            ..Default::default()
        };
        assert!(create_client("cortex", &options).is_err());
    }

    #[test]
    fn test_create_cortex_client() {
        let options = ClientOptions {
            endpoint: Some("https://acct.snowflakecomputing.com".to_string()),
            api_key: Some("token".to_string()),
            ..Default::default()
        };
        let client = create_client("cortex", &options).unwrap();
        assert_eq!(client.provider_name(), "cortex");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", &ClientOptions::default()) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
