//! Configuration loading, validation, and management for DocMind.
//!
//! Loads configuration from `~/.docmind/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Provider credentials are deliberately absent here: they live in the
//! metadata store's settings table and are re-read on every request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docmind/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name the assistant introduces itself with
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Model used when a request does not pick one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for every model call
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector: VectorConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_assistant_name() -> String {
    "DocMind".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_true() -> bool {
    true
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Remote embedding service over HTTP
    Remote,
    /// Local feature hashing; no network, for offline use and tests
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_backend")]
    pub backend: EmbeddingBackend,

    /// Prediction endpoint of the embedding service
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Vector width for the hashing backend
    #[serde(default = "default_hashing_dims")]
    pub hashing_dims: usize,
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Remote
}
fn default_embedding_url() -> String {
    "https://jeyanthangj2004-docmind-embeddings.hf.space/api/predict".into()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_hashing_dims() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            url: default_embedding_url(),
            timeout_secs: default_embedding_timeout(),
            hashing_dims: default_hashing_dims(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Typesense,
    /// Process-local index; contents are lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default = "default_vector_backend")]
    pub backend: VectorBackend,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Used when the settings table has no TYPESENSE_HOST
    #[serde(default = "default_typesense_host")]
    pub default_host: String,

    #[serde(default = "default_typesense_port")]
    pub port: u16,

    #[serde(default = "default_typesense_protocol")]
    pub protocol: String,

    /// Timeout for search calls
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Timeout for bulk import calls during ingestion
    #[serde(default = "default_ingest_timeout")]
    pub ingest_timeout_secs: u64,
}

fn default_vector_backend() -> VectorBackend {
    VectorBackend::Typesense
}
fn default_collection() -> String {
    "text_knowledge_base".into()
}
fn default_typesense_host() -> String {
    "wg7oleaiq5cfpjz3p-1.a1.typesense.net".into()
}
fn default_typesense_port() -> u16 {
    443
}
fn default_typesense_protocol() -> String {
    "https".into()
}
fn default_search_timeout() -> u64 {
    10
}
fn default_ingest_timeout() -> u64 {
    15
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            collection: default_collection(),
            default_host: default_typesense_host(),
            port: default_typesense_port(),
            protocol: default_typesense_protocol(),
            timeout_secs: default_search_timeout(),
            ingest_timeout_secs: default_ingest_timeout(),
        }
    }
}

/// Result budgets and formatting for the document search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result count for summary-intent queries
    #[serde(default = "default_summary_k")]
    pub summary_k: usize,

    /// Result count for specific-intent queries
    #[serde(default = "default_specific_k")]
    pub specific_k: usize,

    /// Result count for the generic fallback search
    #[serde(default = "default_fallback_k")]
    pub fallback_k: usize,

    #[serde(default = "default_fallback_query")]
    pub fallback_query: String,

    /// Each passage is clipped to this many characters
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,

    /// Case-insensitive substrings that mark a query as summary-intent
    #[serde(default = "default_summary_keywords")]
    pub summary_keywords: Vec<String>,

    /// Budget for the query-expansion model call, in seconds. Must stay
    /// below `agent.tool_timeout_secs`; on expiry the raw query is used.
    #[serde(default = "default_expansion_timeout_secs")]
    pub expansion_timeout_secs: u64,
}

fn default_summary_k() -> usize {
    10
}
fn default_specific_k() -> usize {
    4
}
fn default_fallback_k() -> usize {
    10
}
fn default_fallback_query() -> String {
    "research findings technical details".into()
}
fn default_max_passage_chars() -> usize {
    800
}
fn default_expansion_timeout_secs() -> u64 {
    8
}
fn default_summary_keywords() -> Vec<String> {
    vec![
        "summary".into(),
        "summarize".into(),
        "overview".into(),
        "all".into(),
    ]
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            summary_k: default_summary_k(),
            specific_k: default_specific_k(),
            fallback_k: default_fallback_k(),
            fallback_query: default_fallback_query(),
            max_passage_chars: default_max_passage_chars(),
            summary_keywords: default_summary_keywords(),
            expansion_timeout_secs: default_expansion_timeout_secs(),
        }
    }
}

/// What the conversation loop does when it runs out of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Return the last tool output (or an apology) immediately
    Force,
    /// Make one final tool-less model call to synthesize an answer
    Generate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model round-trips per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_early_stopping")]
    pub early_stopping: EarlyStopping,

    /// History turns fed to the model
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Upper bound on a single tool invocation
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_early_stopping() -> EarlyStopping {
    EarlyStopping::Generate
}
fn default_history_limit() -> usize {
    6
}
fn default_tool_timeout() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            early_stopping: default_early_stopping(),
            history_limit: default_history_limit(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Whether the capability is initialized at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_web_results")]
    pub max_results: usize,
}

fn default_web_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_web_timeout() -> u64 {
    15
}
fn default_web_results() -> usize {
    5
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_web_endpoint(),
            timeout_secs: default_web_timeout(),
            max_results: default_web_results(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// SQLite database file (created if missing)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Upper bound on a single metadata read
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}
fn default_sqlite_path() -> String {
    AppConfig::config_dir()
        .join("docmind.db")
        .to_string_lossy()
        .into_owned()
}
fn default_store_timeout() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            sqlite_path: default_sqlite_path(),
            timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_upload() -> usize {
    20 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docmind/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `DOCMIND_MODEL`
    /// - `DOCMIND_EMBEDDING_URL`
    /// - `DOCMIND_STORE_PATH`
    /// - `DOCMIND_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCMIND_*` overrides from a variable lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("DOCMIND_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("DOCMIND_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(path) = lookup("DOCMIND_STORE_PATH") {
            self.store.sqlite_path = path;
        }
        if let Some(port) = lookup("DOCMIND_PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("DOCMIND_PORT is not a port: {port}")))?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docmind")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_limit must be at least 1".into(),
            ));
        }
        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ConfigError::ValidationError(
                "ingest.chunk_overlap must be smaller than a non-zero ingest.chunk_size".into(),
            ));
        }
        if self.retrieval.max_passage_chars == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_passage_chars must be at least 1".into(),
            ));
        }
        if self.retrieval.expansion_timeout_secs == 0
            || self.retrieval.expansion_timeout_secs >= self.agent.tool_timeout_secs
        {
            return Err(ConfigError::ValidationError(
                "retrieval.expansion_timeout_secs must be non-zero and below agent.tool_timeout_secs"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            default_model: default_model(),
            temperature: default_temperature(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector: VectorConfig::default(),
            retrieval: RetrievalConfig::default(),
            agent: AgentConfig::default(),
            web_search: WebSearchConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assistant_name, "DocMind");
        assert_eq!(config.agent.history_limit, 6);
        assert_eq!(config.agent.early_stopping, EarlyStopping::Generate);
        assert_eq!(config.retrieval.summary_k, 10);
        assert_eq!(config.retrieval.specific_k, 4);
        assert!(config.retrieval.expansion_timeout_secs < config.agent.tool_timeout_secs);
    }

    #[test]
    fn expansion_budget_must_fit_inside_tool_timeout() {
        let mut config = AppConfig::default();
        config.retrieval.expansion_timeout_secs = config.agent.tool_timeout_secs;
        assert!(config.validate().is_err());
        config.retrieval.expansion_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.vector.collection, "text_knowledge_base");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.ingest.chunk_overlap = config.ingest.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "mixtral-8x7b"

[agent]
early_stopping = "force"
max_iterations = 5

[vector]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "mixtral-8x7b");
        assert_eq!(config.agent.early_stopping, EarlyStopping::Force);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.history_limit, 6);
        assert_eq!(config.vector.backend, VectorBackend::Memory);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "agent = 3").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("DOCMIND_MODEL", "gemma2-9b-it"),
            ("DOCMIND_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.default_model, "gemma2-9b-it");
        assert_eq!(config.gateway.port, 9000);
    }

    #[test]
    fn bad_port_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|k| (k == "DOCMIND_PORT").then(|| "abc".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("text_knowledge_base"));
        assert!(toml_str.contains("early_stopping"));
    }
}
