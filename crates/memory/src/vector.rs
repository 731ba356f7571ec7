//! Vector similarity and the process-local vector index.

use std::sync::Arc;

use async_trait::async_trait;
use docmind_core::error::MemoryError;
use docmind_core::retrieval::{
    IndexFactory, IndexedPassage, RetrievedPassage, TenantFilter, VectorIndex, WipeOutcome,
    check_owner,
};
use docmind_core::store::SecretSet;
use tokio::sync::RwLock;
use tracing::debug;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Brute-force cosine index held in process memory.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    passages: RwLock<Vec<IndexedPassage>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.passages.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &TenantFilter,
    ) -> Result<Vec<RetrievedPassage>, MemoryError> {
        check_owner(filter.owner())?;
        let passages = self.passages.read().await;

        // Filter before ranking: other tenants never enter the candidate set.
        let mut scored: Vec<(f32, &IndexedPassage)> = passages
            .iter()
            .filter(|p| filter.matches(&p.owner))
            .map(|p| (cosine_similarity(&p.vector, vector), p))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        debug!(owner = filter.owner(), k, hits = scored.len(), "In-memory vector query");

        Ok(scored
            .into_iter()
            .map(|(_, p)| RetrievedPassage::new(&p.text, &p.source))
            .collect())
    }

    async fn insert(&self, passages: Vec<IndexedPassage>) -> Result<usize, MemoryError> {
        for p in &passages {
            check_owner(&p.owner)?;
        }
        let count = passages.len();
        self.passages.write().await.extend(passages);
        Ok(count)
    }

    async fn wipe(&self) -> Result<WipeOutcome, MemoryError> {
        let mut passages = self.passages.write().await;
        if passages.is_empty() {
            return Ok(WipeOutcome::AlreadyEmpty);
        }
        passages.clear();
        Ok(WipeOutcome::Deleted)
    }
}

/// Hands out one shared index regardless of the secret set.
pub struct SharedIndexFactory {
    index: Arc<dyn VectorIndex>,
}

impl SharedIndexFactory {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

impl IndexFactory for SharedIndexFactory {
    fn build(&self, _secrets: &SecretSet) -> docmind_core::Result<Arc<dyn VectorIndex>> {
        Ok(self.index.clone())
    }
}
