//! Minimal HTTP client for a graph-backed knowledge retrieval service.
//!
//! This crate provides a focused transport for the service's JSON API:
//! - `POST /query` for natural-language retrieval
//! - `GET /graph/entity/exists` existence probes
//! - `GET /graph/label/list` entity type labels
//! - `GET /health` service status
//!
//! It reports every failure as a typed [`Error`]. Deciding what to do about a
//! failure (fallback data, sentinel results) is left to the caller.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9621";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const API_KEY_HEADER: &str = "x-api-key";

/// Errors that can occur when talking to the knowledge service.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        // A connect timeout reports both flags; the timeout is the more useful one.
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            Error::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else if e.is_decode() {
            Error::Parse(e.to_string())
        } else {
            Error::Unexpected(e.to_string())
        }
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ConnectionFailed,
    Timeout,
    HttpStatus(u16),
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConnectionFailed => write!(f, "connection_failed"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(status) => write!(f, "http_{status}"),
            FailureKind::Unexpected => write!(f, "unexpected"),
        }
    }
}

impl Error {
    /// Classify this error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Connection(_) => FailureKind::ConnectionFailed,
            Error::Timeout(_) => FailureKind::Timeout,
            Error::Status { status, .. } => FailureKind::HttpStatus(*status),
            Error::Parse(_) | Error::Unexpected(_) | Error::Config(_) => FailureKind::Unexpected,
        }
    }

    /// A message suitable for showing to a user.
    ///
    /// Unlike the `Display` output this never includes raw transport details,
    /// only the cause in plain words.
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(_) => {
                "Connection failed: cannot reach the knowledge service (connection refused)"
                    .to_string()
            }
            Error::Timeout(_) => {
                "Request timed out: the knowledge service did not respond in time".to_string()
            }
            Error::Status {
                status: status @ (401 | 403),
                ..
            } => format!("Authentication failed: unauthorized (HTTP {status})"),
            Error::Status { status: 404, .. } => {
                "Service not found: endpoint not available (HTTP 404)".to_string()
            }
            Error::Status { status, .. } => {
                format!("Knowledge service error: request failed with HTTP {status}")
            }
            Error::Parse(_) => {
                "Unexpected response: the knowledge service returned a malformed body".to_string()
            }
            Error::Unexpected(msg) => format!("Unexpected knowledge service error: {msg}"),
            Error::Config(msg) => format!("Invalid knowledge service configuration: {msg}"),
        }
    }

    /// Remediation hints for this error, most likely fix first.
    pub fn troubleshooting(&self, config: &KnowledgeConfig) -> Vec<String> {
        match self {
            Error::Connection(_) | Error::Timeout(_) => vec![
                format!("Check KNOWLEDGE_BASE_URL: {}", config.base_url),
                "Verify the knowledge service is running".to_string(),
                "Check your network connection".to_string(),
                format!(
                    "Raise KNOWLEDGE_TIMEOUT (currently {}s) if the service is slow",
                    config.timeout.as_secs()
                ),
            ],
            Error::Status {
                status: 401 | 403, ..
            } => vec![
                "Check your KNOWLEDGE_API_KEY environment variable".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Error::Status { status: 404, .. } => vec![
                format!("Verify KNOWLEDGE_BASE_URL is correct: {}", config.base_url),
                "Check knowledge service version compatibility".to_string(),
                "Ensure all required API endpoints are available".to_string(),
            ],
            _ => vec![
                "Check the knowledge service logs".to_string(),
                "Verify the service configuration".to_string(),
                "Try mock mode: KNOWLEDGE_MOCK_MODE=true".to_string(),
            ],
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the knowledge service.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Sent as `X-API-Key` when present.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Serve deterministic offline data instead of calling the service.
    pub mock_mode: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl KnowledgeConfig {
    /// Create a config for the given base URL with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mock_mode: false,
        }
    }

    /// A config that never touches the network.
    pub fn mock() -> Self {
        Self::default().with_mock_mode(true)
    }

    /// Load the config from `KNOWLEDGE_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the config through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config =
            Self::new(lookup("KNOWLEDGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()));

        config.api_key = lookup("KNOWLEDGE_API_KEY").filter(|k| !k.is_empty());

        if let Some(raw) = lookup("KNOWLEDGE_TIMEOUT") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("KNOWLEDGE_TIMEOUT must be whole seconds, got '{raw}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.mock_mode = lookup("KNOWLEDGE_MOCK_MODE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }
}

// ============================================================================
// Public types
// ============================================================================

/// Retrieval strategy passed through to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Local,
    Global,
    Hybrid,
    Naive,
    #[default]
    Mix,
    Bypass,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Naive => "naive",
            QueryMode::Mix => "mix",
            QueryMode::Bypass => "bypass",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(QueryMode::Local),
            "global" => Ok(QueryMode::Global),
            "hybrid" => Ok(QueryMode::Hybrid),
            "naive" => Ok(QueryMode::Naive),
            "mix" => Ok(QueryMode::Mix),
            "bypass" => Ok(QueryMode::Bypass),
            other => Err(Error::Config(format!("unknown query mode '{other}'"))),
        }
    }
}

/// One prior turn of conversation sent along with a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `POST /query` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub mode: QueryMode,
    pub top_k: usize,
    pub chunk_top_k: usize,
    pub max_total_tokens: usize,
    pub response_type: &'static str,
    pub enable_rerank: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<HistoryTurn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_turns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

impl QueryRequest {
    /// Create a request with default retrieval parameters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: QueryMode::default(),
            top_k: 10,
            chunk_top_k: 10,
            max_total_tokens: 4000,
            response_type: "JSON",
            enable_rerank: true,
            stream: None,
            conversation_history: None,
            history_turns: None,
            user_prompt: None,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_chunk_top_k(mut self, chunk_top_k: usize) -> Self {
        self.chunk_top_k = chunk_top_k;
        self
    }

    pub fn with_max_total_tokens(mut self, max_total_tokens: usize) -> Self {
        self.max_total_tokens = max_total_tokens;
        self
    }

    pub fn with_rerank(mut self, enable_rerank: bool) -> Self {
        self.enable_rerank = enable_rerank;
        self
    }

    /// Attach prior turns; `history_turns` is set to the number supplied.
    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history_turns = Some(history.len());
        self.conversation_history = Some(history);
        self
    }

    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }
}

/// Service status reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub pipeline_busy: Option<bool>,
    #[serde(default)]
    pub core_version: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

// ============================================================================
// Client
// ============================================================================

/// Knowledge service HTTP client.
#[derive(Clone)]
pub struct KnowledgeApi {
    client: reqwest::Client,
    config: KnowledgeConfig,
}

impl KnowledgeApi {
    /// Build a client for the given config.
    ///
    /// Fails if the base URL or API key cannot be used on the wire.
    pub fn new(config: KnowledgeConfig) -> Result<Self, Error> {
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {e}", config.base_url)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(build_headers(config.api_key.as_deref())?)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Run a retrieval query and return the raw response body.
    pub async fn query(&self, request: &QueryRequest) -> Result<String, Error> {
        debug!(query = %request.query, mode = %request.mode, "POST /query");
        let response = self
            .client
            .post(self.url("/query"))
            .json(request)
            .send()
            .await?;
        read_body(response).await
    }

    /// Probe whether an entity with this exact name exists in the graph.
    pub async fn entity_exists(&self, name: &str) -> Result<bool, Error> {
        #[derive(Deserialize)]
        struct Exists {
            #[serde(default)]
            exists: bool,
        }

        let response = self
            .client
            .get(self.url("/graph/entity/exists"))
            .query(&[("name", name)])
            .send()
            .await?;
        let body = read_body(response).await?;
        let parsed: Exists =
            serde_json::from_str(&body).map_err(|e| Error::Parse(format!("{e}: {body}")))?;
        Ok(parsed.exists)
    }

    /// List the entity type labels known to the graph.
    pub async fn label_list(&self) -> Result<Vec<String>, Error> {
        let response = self.client.get(self.url("/graph/label/list")).send().await?;
        let body = read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(format!("{e}: {body}")))
    }

    /// Fetch the service status.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let response = self.client.get(self.url("/health")).send().await?;
        let body = read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(format!("{e}: {body}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }
}

fn build_headers(api_key: Option<&str>) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(key).map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
    }
    Ok(headers)
}

async fn read_body(response: reqwest::Response) -> Result<String, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = KnowledgeConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.mock_mode);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = KnowledgeConfig::from_lookup(lookup(&[
            ("KNOWLEDGE_BASE_URL", "http://test:9000/"),
            ("KNOWLEDGE_API_KEY", "env-key"),
            ("KNOWLEDGE_TIMEOUT", "60"),
            ("KNOWLEDGE_MOCK_MODE", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://test:9000");
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.mock_mode);
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        let err = KnowledgeConfig::from_lookup(lookup(&[("KNOWLEDGE_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let result = KnowledgeApi::new(KnowledgeConfig::new("not a url"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_failure_kind_names() {
        assert_eq!(FailureKind::ConnectionFailed.to_string(), "connection_failed");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
        assert_eq!(FailureKind::HttpStatus(503).to_string(), "http_503");
        assert_eq!(FailureKind::Unexpected.to_string(), "unexpected");

        let err = Error::Status {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.kind(), FailureKind::HttpStatus(500));
        assert_eq!(Error::Parse("x".into()).kind(), FailureKind::Unexpected);
    }

    #[test]
    fn test_user_messages_distinguish_causes() {
        let refused = Error::Connection("tcp connect error".into()).user_message();
        let unauthorized = Error::Status {
            status: 401,
            body: "nope".into(),
        }
        .user_message();
        let missing = Error::Status {
            status: 404,
            body: String::new(),
        }
        .user_message();

        assert!(refused.contains("connection refused"));
        assert!(unauthorized.contains("unauthorized"));
        assert!(missing.contains("not found"));
        assert!(!refused.contains("tcp connect error"));
    }

    #[test]
    fn test_troubleshooting_mentions_base_url() {
        let config = KnowledgeConfig::new("http://kg.internal:9621");
        let hints = Error::Timeout("slow".into()).troubleshooting(&config);
        assert!(hints[0].contains("http://kg.internal:9621"));
    }

    #[test]
    fn test_query_request_serialization() {
        let request = QueryRequest::new("Who is Lily?")
            .with_mode(QueryMode::Local)
            .with_top_k(5);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["query"], "Who is Lily?");
        assert_eq!(json["mode"], "local");
        assert_eq!(json["top_k"], 5);
        assert_eq!(json["response_type"], "JSON");
        assert_eq!(json["enable_rerank"], true);
        assert!(json.get("stream").is_none());
        assert!(json.get("conversation_history").is_none());
    }

    #[test]
    fn test_query_request_history() {
        let request = QueryRequest::new("and then?").with_history(vec![
            HistoryTurn::user("Tell me about the forest"),
            HistoryTurn::assistant("It is magical."),
        ]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["history_turns"], 2);
        assert_eq!(json["conversation_history"][1]["role"], "assistant");
    }

    #[test]
    fn test_query_mode_parsing() {
        assert_eq!("HYBRID".parse::<QueryMode>().unwrap(), QueryMode::Hybrid);
        assert!("semantic".parse::<QueryMode>().is_err());
        assert_eq!(QueryMode::default().to_string(), "mix");
    }

    #[test]
    fn test_health_status_tolerates_missing_fields() {
        let health: HealthStatus = serde_json::from_str(r#"{"status": "healthy"}"#).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.pipeline_busy, None);
    }
}
