//! Inbound chat request and outbound response.

use serde::{Deserialize, Serialize};

/// One user question. Immutable for the lifetime of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
    /// Tenant identity. Scopes every retrieval.
    pub user_id: String,
    pub model_name: String,
    #[serde(default)]
    pub use_web: bool,
}

/// The single conversational reply. Failures are reported as text in the
/// same field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

impl ChatResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_web_defaults_to_false() {
        let json = r#"{"query":"hi","session_id":"s","user_id":"u","model_name":"m"}"#;
        let req: ChatRequest = serde_json::from_str(json).unwrap();
        assert!(!req.use_web);
    }
}
