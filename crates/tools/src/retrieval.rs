//! Tiered, tenant-scoped document retrieval and the `search_internal_documents` tool.
//!
//! One retrieval runs:
//!
//! 1. intent classification, which picks the result budget
//! 2. query expansion (falls back to the raw query)
//! 3. a primary search with the expanded query
//! 4. a generic fallback search, still filtered to the tenant, when the
//!    primary search comes back empty
//!
//! Two distinct sentinels come out of it: [`NO_RESULTS_SENTINEL`] when both
//! tiers are empty, and a [`TOOL_FAILURE_PREFIX`] message when anything
//! errored. The tool therefore always answers with text.

use std::collections::HashSet;

use async_trait::async_trait;
use docmind_config::RetrievalConfig;
use docmind_core::error::{MemoryError, ToolError};
use docmind_core::retrieval::{RetrievedPassage, TenantFilter};
use docmind_core::tool::{Tool, ToolResult, query_argument, query_schema};
use docmind_memory::VectorSearchClient;
use tracing::{debug, info, warn};

use crate::expansion::{QueryExpander, QueryIntent};

pub const DOCUMENT_SEARCH_TOOL: &str = "search_internal_documents";

/// Returned when neither search tier found anything for the tenant.
pub const NO_RESULTS_SENTINEL: &str =
    "Zero snippets retrieved. The document may not be indexed or is empty.";

/// Prefix of the message returned when the search itself failed.
pub const TOOL_FAILURE_PREFIX: &str = "Internal search failure: ";

/// Result of one retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    /// Formatted `[source] text` lines.
    Found(String),
    NoResults,
    Failure(String),
}

impl RetrievalOutcome {
    /// The text handed back to the model.
    pub fn render(&self) -> String {
        match self {
            RetrievalOutcome::Found(text) => text.clone(),
            RetrievalOutcome::NoResults => NO_RESULTS_SENTINEL.to_string(),
            RetrievalOutcome::Failure(reason) => format!("{TOOL_FAILURE_PREFIX}{reason}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RetrievalOutcome::Failure(_))
    }
}

/// Deduplicate by exact text, clip each passage and render one line per
/// passage in rank order.
pub fn format_passages(passages: &[RetrievedPassage], max_chars: usize) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut lines = Vec::with_capacity(passages.len());

    for passage in passages {
        if !seen.insert(passage.text.as_str()) {
            continue;
        }
        let clipped: String = passage
            .text
            .replace('\n', " ")
            .trim()
            .chars()
            .take(max_chars)
            .collect();
        lines.push(format!("[{}] {}", passage.source_label, clipped));
    }

    lines.join("\n")
}

/// Retrieval bound to one tenant and one language model.
pub struct Retriever {
    search: VectorSearchClient,
    expander: QueryExpander,
    tenant: TenantFilter,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        search: VectorSearchClient,
        expander: QueryExpander,
        tenant: TenantFilter,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            search,
            expander,
            tenant,
            config,
        }
    }

    pub fn intent(&self, query: &str) -> QueryIntent {
        QueryIntent::classify(query, &self.config.summary_keywords)
    }

    /// Result budget for an intent branch.
    pub fn budget(&self, intent: QueryIntent) -> usize {
        match intent {
            QueryIntent::Summary => self.config.summary_k,
            QueryIntent::Specific => self.config.specific_k,
        }
    }

    /// Run the full retrieval. Never fails; errors become [`RetrievalOutcome::Failure`].
    pub async fn retrieve(&self, query: &str) -> RetrievalOutcome {
        match self.try_retrieve(query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(owner = self.tenant.owner(), error = %e, "Document search failed");
                RetrievalOutcome::Failure(e.to_string())
            }
        }
    }

    async fn try_retrieve(&self, query: &str) -> Result<RetrievalOutcome, MemoryError> {
        let intent = self.intent(query);
        let k = self.budget(intent);
        info!(owner = self.tenant.owner(), ?intent, k, query, "Document search");

        let expanded = self.expander.expand(query, intent).await;

        let mut passages = self.search.search(&expanded, k, &self.tenant).await?;

        if passages.is_empty() {
            info!(
                owner = self.tenant.owner(),
                fallback_query = %self.config.fallback_query,
                "No results for expanded query, trying generic search"
            );
            passages = self
                .search
                .search(&self.config.fallback_query, self.config.fallback_k, &self.tenant)
                .await?;
        }

        if passages.is_empty() {
            return Ok(RetrievalOutcome::NoResults);
        }

        debug!(count = passages.len(), "Retrieved snippets");
        Ok(RetrievalOutcome::Found(format_passages(
            &passages,
            self.config.max_passage_chars,
        )))
    }
}

/// `search_internal_documents`: the retrieval pipeline as a tool.
pub struct DocumentSearchTool {
    retriever: Retriever,
}

impl DocumentSearchTool {
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        DOCUMENT_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Searches through the user's uploaded PDF documents for specific facts, topics, or to generate a summary."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema("What to look for in the user's documents")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;
        let outcome = self.retriever.retrieve(query).await;
        Ok(ToolResult {
            call_id: String::new(),
            success: !outcome.is_failure(),
            output: outcome.render(),
        })
    }
}
