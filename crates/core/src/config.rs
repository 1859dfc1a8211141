//! Configuration management for codechat.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.codechat/config.yaml)
//! - Environment variables (a `.env` file in the working directory is honoured)
//! - Command-line flags
//!
//! Later sources override earlier ones. Configuration is read once at startup
//! and passed explicitly to the services built from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default number of passages requested from the search service.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 4;

/// Default relevance gate applied to retrieved passages.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.50;

/// Column of the search service holding document text.
pub const DEFAULT_SEARCH_COLUMN: &str = "doc_text";

/// Token type header value for programmatic access tokens.
pub const DEFAULT_TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";

const KNOWN_PROVIDERS: [&str; 2] = ["cortex", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .codechat/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("cortex" or "ollama")
    pub provider: String,

    /// Model identifier used for answers and feedback scoring
    pub model: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON
    pub json_logs: bool,

    /// Snowflake account connection settings
    pub snowflake: SnowflakeConfig,

    /// Search service selection and request shape
    pub search: SearchConfig,

    /// Relevance gate settings
    pub retrieval: RetrievalConfig,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,
}

/// Snowflake account settings shared by search and Cortex completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Base URL, e.g. `https://myorg-myaccount.snowflakecomputing.com`
    pub account_url: Option<String>,

    /// Bearer token for the REST APIs
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Value of the `X-Snowflake-Authorization-Token-Type` header
    pub token_type: String,
}

/// Search service identifiers and request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub service: Option<String>,

    /// Document-text column projected from each result
    pub column: String,

    /// Number of results requested per query
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database: None,
            schema: None,
            service: None,
            column: DEFAULT_SEARCH_COLUMN.to_string(),
            limit: DEFAULT_RETRIEVAL_LIMIT,
        }
    }
}

/// Relevance gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub relevance_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

/// Fully resolved path of a search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchServiceId {
    pub database: String,
    pub schema: String,
    pub service: String,
}

/// Fully resolved Snowflake connection.
#[derive(Debug, Clone)]
pub struct CortexConnection {
    pub account_url: String,
    pub token: String,
    pub token_type: String,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
///
/// Untagged: `Ollama` is tried first because it is the only variant with a
/// required `endpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
    Cortex {
        model: String,
        #[serde(rename = "accountUrl")]
        account_url: Option<String>,
        #[serde(rename = "tokenEnv")]
        token_env: Option<String>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            Self::Ollama { model, .. } | Self::Cortex { model, .. } => model,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    search: Option<SearchSection>,
    retrieval: Option<RetrievalSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchSection {
    database: Option<String>,
    schema: Option<String>,
    service: Option<String>,
    column: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrievalSection {
    #[serde(rename = "relevanceThreshold")]
    relevance_threshold: Option<f32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "cortex".to_string(),
            model: "mistral-large2".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            snowflake: SnowflakeConfig {
                account_url: None,
                token: None,
                token_type: DEFAULT_TOKEN_TYPE.to_string(),
            },
            search: SearchConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment, `.env` and defaults.
    ///
    /// Environment variables:
    /// - `CODECHAT_WORKSPACE`: Override workspace path
    /// - `CODECHAT_CONFIG`: Path to config file
    /// - `CODECHAT_PROVIDER`: Completion provider
    /// - `CODECHAT_MODEL`: Model identifier
    /// - `SNOWFLAKE_ACCOUNT_URL` / `SNOWFLAKE_ACCOUNT`: Account base URL or locator
    /// - `SNOWFLAKE_TOKEN`, `SNOWFLAKE_TOKEN_TYPE`: REST credentials
    /// - `SNOWFLAKE_DATABASE`, `SNOWFLAKE_SCHEMA`, `SNOWFLAKE_CORTEX_SEARCH_SERVICE`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use codechat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file chosen
    /// by the caller (e.g. CLI flags) so the right YAML file is merged.
    pub fn load_from(workspace: Option<&Path>, config_file: Option<&Path>) -> AppResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(AppError::Config(format!("Failed to read .env: {}", e))),
        }

        Self::load_with(|key| match key {
            "CODECHAT_WORKSPACE" if workspace.is_some() => {
                workspace.map(|p| p.display().to_string())
            }
            "CODECHAT_CONFIG" if config_file.is_some() => {
                config_file.map(|p| p.display().to_string())
            }
            _ => std::env::var(key).ok(),
        })
    }

    /// Load configuration using `lookup` in place of the process environment.
    pub fn load_with<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workspace) = lookup("CODECHAT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = lookup("CODECHAT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.codechat_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path, &lookup)?;
        }

        // Environment variables override YAML config
        if let Some(provider) = lookup("CODECHAT_PROVIDER") {
            config.provider = provider;
        }

        if let Some(model) = lookup("CODECHAT_MODEL") {
            config.model = model;
        }

        if let Some(url) = lookup("SNOWFLAKE_ACCOUNT_URL") {
            config.snowflake.account_url = Some(url.trim_end_matches('/').to_string());
        } else if let Some(account) = lookup("SNOWFLAKE_ACCOUNT") {
            config.snowflake.account_url = Some(account_url_for(&account));
        }

        if let Some(token) = lookup("SNOWFLAKE_TOKEN") {
            config.snowflake.token = Some(token);
        }

        if let Some(token_type) = lookup("SNOWFLAKE_TOKEN_TYPE") {
            config.snowflake.token_type = token_type;
        }

        if let Some(database) = lookup("SNOWFLAKE_DATABASE") {
            config.search.database = Some(database);
        }

        if let Some(schema) = lookup("SNOWFLAKE_SCHEMA") {
            config.search.schema = Some(schema);
        }

        if let Some(service) = lookup("SNOWFLAKE_CORTEX_SEARCH_SERVICE") {
            config.search.service = Some(service);
        }

        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml<F>(&self, path: &Path, lookup: &F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(search) = config_file.search {
            result.search.database = search.database.or(result.search.database);
            result.search.schema = search.schema.or(result.search.schema);
            result.search.service = search.service.or(result.search.service);
            if let Some(column) = search.column {
                result.search.column = column;
            }
            if let Some(limit) = search.limit {
                result.search.limit = limit;
            }
        }

        if let Some(threshold) = config_file.retrieval.and_then(|r| r.relevance_threshold) {
            result.retrieval.relevance_threshold = threshold;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();

                if let ProviderConfig::Cortex {
                    account_url,
                    token_env,
                    ..
                } = provider_config
                {
                    if let Some(url) = account_url {
                        result.snowflake.account_url = Some(url.trim_end_matches('/').to_string());
                    }
                    if let Some(token) = token_env.as_deref().and_then(lookup) {
                        result.snowflake.token = Some(token);
                    }
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the .codechat directory.
    pub fn codechat_dir(&self) -> PathBuf {
        self.workspace.join(".codechat")
    }

    /// Get the active provider configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for the active provider, if configured.
    pub fn provider_endpoint(&self) -> Option<String> {
        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Ollama { endpoint, .. }) => Some(endpoint.clone()),
            Some(ProviderConfig::Cortex { .. }) | None if self.provider == "cortex" => {
                self.snowflake.account_url.clone()
            }
            _ => None,
        }
    }

    /// Request timeout for the active provider, in seconds.
    pub fn provider_timeout(&self) -> Option<u64> {
        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Ollama { timeout, .. }) => *timeout,
            _ => None,
        }
    }

    /// Resolve the Snowflake connection used by search and Cortex completion.
    pub fn cortex_connection(&self) -> AppResult<CortexConnection> {
        let account_url = self.snowflake.account_url.clone().ok_or_else(|| {
            AppError::Config(
                "Snowflake account not configured: set SNOWFLAKE_ACCOUNT or SNOWFLAKE_ACCOUNT_URL"
                    .to_string(),
            )
        })?;

        let token = self.snowflake.token.clone().ok_or_else(|| {
            AppError::Config("Snowflake token not configured: set SNOWFLAKE_TOKEN".to_string())
        })?;

        Ok(CortexConnection {
            account_url,
            token,
            token_type: self.snowflake.token_type.clone(),
        })
    }

    /// Resolve the database/schema/service triple of the search service.
    pub fn search_service(&self) -> AppResult<SearchServiceId> {
        let required = |value: &Option<String>, env: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("Search service not configured: set {}", env)))
        };

        Ok(SearchServiceId {
            database: required(&self.search.database, "SNOWFLAKE_DATABASE")?,
            schema: required(&self.search.schema, "SNOWFLAKE_SCHEMA")?,
            service: required(&self.search.service, "SNOWFLAKE_CORTEX_SEARCH_SERVICE")?,
        })
    }

    /// Validate configuration values that do not depend on the network.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.search.limit == 0 {
            return Err(AppError::Config(
                "search.limit must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.relevance_threshold) {
            return Err(AppError::Config(format!(
                "retrieval.relevanceThreshold must be within 0.0..=1.0, got {}",
                self.retrieval.relevance_threshold
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier is empty".to_string()));
        }

        Ok(())
    }
}

/// Build the REST base URL for an account locator such as `myorg-myaccount`.
fn account_url_for(account: &str) -> String {
    format!("https://{}.snowflakecomputing.com", account.trim())
}
