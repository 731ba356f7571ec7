//! Per-request tool set assembly.

use std::sync::Arc;
use std::time::Duration;

use docmind_config::RetrievalConfig;
use docmind_core::provider::Provider;
use docmind_core::retrieval::{Embedder, IndexFactory, TenantFilter};
use docmind_core::store::SecretSet;
use docmind_core::tool::ToolRegistry;
use docmind_core::web::WebSearchBackend;
use docmind_memory::VectorSearchClient;
use tracing::info;

use crate::expansion::QueryExpander;
use crate::retrieval::{DocumentSearchTool, Retriever};
use crate::web_search::WebSearchTool;

/// The tools active for one request.
pub struct ToolSet {
    pub registry: ToolRegistry,
    /// Whether `search_web` made it into the registry. The system prompt
    /// advertises web search only when this is true.
    pub web_search_active: bool,
}

/// Holds the process-wide pieces and binds them to a request.
#[derive(Clone)]
pub struct ToolSetBuilder {
    embedder: Arc<dyn Embedder>,
    index_factory: Arc<dyn IndexFactory>,
    web_search: Option<Arc<dyn WebSearchBackend>>,
    retrieval: RetrievalConfig,
}

impl ToolSetBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index_factory: Arc<dyn IndexFactory>,
        web_search: Option<Arc<dyn WebSearchBackend>>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index_factory,
            web_search,
            retrieval,
        }
    }

    pub fn web_search_available(&self) -> bool {
        self.web_search.is_some()
    }

    /// Document search always comes first; `search_web` follows only when
    /// requested and available.
    ///
    /// Fails only when the vector index cannot be configured from `secrets`.
    pub fn build(
        &self,
        secrets: &SecretSet,
        tenant_id: &str,
        llm: Arc<dyn Provider>,
        model: &str,
        temperature: f32,
        web_enabled: bool,
    ) -> docmind_core::Result<ToolSet> {
        let index = self.index_factory.build(secrets)?;
        let retriever = Retriever::new(
            VectorSearchClient::new(self.embedder.clone(), index),
            QueryExpander::new(llm, model, temperature)
                .with_timeout(Duration::from_secs(self.retrieval.expansion_timeout_secs)),
            TenantFilter::new(tenant_id),
            self.retrieval.clone(),
        );

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(DocumentSearchTool::new(retriever)));

        let web_search_active = match (&self.web_search, web_enabled) {
            (Some(backend), true) => {
                registry.register(Box::new(WebSearchTool::new(backend.clone())));
                info!(tenant_id, "Web search enabled for this request");
                true
            }
            (None, true) => {
                info!(tenant_id, "Web search requested but unavailable, omitting");
                false
            }
            (_, false) => {
                info!(tenant_id, "Document search only for this request");
                false
            }
        };

        Ok(ToolSet {
            registry,
            web_search_active,
        })
    }
}
