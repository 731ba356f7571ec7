//! Error types for the DocMind domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all DocMind operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store / index errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Ingestion errors ---
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    // --- Configuration errors ---
    /// A required secret or setting is missing. Not retryable.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a configuration problem (as opposed to a
    /// transient upstream failure).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The embedding service failed; the upstream error is carried unchanged.
    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Store read timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors raised while ingesting a document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload itself is unacceptable (wrong type, no text). User-facing.
    #[error("{0}")]
    Validation(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// A required setting for the index is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Indexing failed: {0}")]
    Indexing(String),
}
