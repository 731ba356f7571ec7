//! Web search seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// An external web search capability.
///
/// Constructed once at process start and shared read-only by every request.
#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<WebResult>, ToolError>;
}
