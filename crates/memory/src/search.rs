//! Text-in, passages-out similarity search.

use std::sync::Arc;

use docmind_core::error::MemoryError;
use docmind_core::retrieval::{Embedder, RetrievedPassage, TenantFilter, VectorIndex};
use tracing::debug;

/// Embeds a query and runs a tenant-filtered nearest-neighbour lookup.
#[derive(Clone)]
pub struct VectorSearchClient {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl VectorSearchClient {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `k` passages ranked by similarity. Embedding errors propagate
    /// unchanged inside [`MemoryError::Embedding`].
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: &TenantFilter,
    ) -> Result<Vec<RetrievedPassage>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(query_text).await?;
        let passages = self.index.query(&vector, k, filter).await?;
        debug!(
            index = self.index.name(),
            owner = filter.owner(),
            k,
            hits = passages.len(),
            "Vector search"
        );
        Ok(passages)
    }
}
