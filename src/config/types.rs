use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Thread-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub client: ClientConfig,
    pub output: OutputConfig,
}

/// Harvest engine behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Endpoint that serves both main-sequence and reply continuations
    pub endpoint: String,

    /// Optional API key appended as `?key=` to the endpoint
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Hard ceiling on main-sequence page fetches
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum number of reply collections fetched concurrently
    #[serde(rename = "reply-concurrency", default = "default_reply_concurrency")]
    pub reply_concurrency: u32,

    /// Maximum nesting depth followed inside one reply subtree
    #[serde(rename = "max-reply-depth", default = "default_max_reply_depth")]
    pub max_reply_depth: u32,

    /// How long to wait for the client context before giving up (milliseconds)
    #[serde(rename = "ready-timeout-ms", default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl HarvestConfig {
    /// Creates a config for `endpoint` with every other field at its default
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            max_pages: default_max_pages(),
            reply_concurrency: default_reply_concurrency(),
            max_reply_depth: default_max_reply_depth(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Retry/backoff policy for every remote call
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on each further attempt (milliseconds)
    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Client identification sent in every request context
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "client-name")]
    pub client_name: String,

    #[serde(rename = "client-version")]
    pub client_version: String,

    /// Interface language
    #[serde(default = "default_hl")]
    pub hl: String,

    /// Content region
    #[serde(default = "default_gl")]
    pub gl: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_max_pages() -> u32 {
    2000
}

fn default_reply_concurrency() -> u32 {
    4
}

fn default_max_reply_depth() -> u32 {
    8
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_hl() -> String {
    "en".to_string()
}

fn default_gl() -> String {
    "US".to_string()
}
