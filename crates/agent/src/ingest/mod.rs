//! Document ingestion: PDF text extraction, chunking, embedding and
//! tenant-tagged indexing.

pub mod chunker;

use std::sync::Arc;

use docmind_config::IngestConfig;
use docmind_core::error::IngestError;
use docmind_core::retrieval::{
    Embedder, IndexFactory, IndexedPassage, VectorIndex, WipeOutcome, check_owner,
};
use docmind_memory::ConfigResolver;
use serde::Serialize;
use tracing::{info, warn};

pub use chunker::RecursiveSplitter;

/// Chunks embedded per call to the embedding service.
const EMBED_BATCH: usize = 64;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub chunks: usize,
}

impl IngestReport {
    pub fn message(&self) -> String {
        format!("Successfully processed {}", self.filename)
    }
}

/// Extract all text from a PDF held in memory.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, IngestError> {
    // pdf-extract is synchronous and may panic on malformed input; a panic
    // surfaces here as a JoinError.
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| IngestError::Extraction(format!("PDF parser aborted: {e}")))?
        .map_err(|e| IngestError::Extraction(e.to_string()))
}

/// The owner must be storable verbatim, or later searches could not match it.
fn validate_user(user_id: &str) -> Result<(), IngestError> {
    if user_id.trim().is_empty() {
        return Err(IngestError::Validation("A user_id is required.".into()));
    }
    check_owner(user_id).map_err(|e| IngestError::Validation(e.to_string()))
}

/// Writes documents into the vector index on behalf of one tenant.
#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index_factory: Arc<dyn IndexFactory>,
    settings: ConfigResolver,
    splitter: RecursiveSplitter,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index_factory: Arc<dyn IndexFactory>,
        settings: ConfigResolver,
        config: &IngestConfig,
    ) -> Self {
        Self {
            embedder,
            index_factory,
            settings,
            splitter: RecursiveSplitter::new(config.chunk_size, config.chunk_overlap),
        }
    }

    /// Validate, extract and index an uploaded PDF.
    pub async fn ingest_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        user_id: &str,
    ) -> Result<IngestReport, IngestError> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(IngestError::Validation("Only PDF files are supported.".into()));
        }
        validate_user(user_id)?;
        let text = extract_pdf_text(bytes).await?;
        self.ingest_text(filename, &text, user_id).await
    }

    /// Chunk, embed and index already-extracted text.
    pub async fn ingest_text(
        &self,
        filename: &str,
        text: &str,
        user_id: &str,
    ) -> Result<IngestReport, IngestError> {
        validate_user(user_id)?;
        if text.trim().is_empty() {
            return Err(IngestError::Validation(
                "The PDF appears to be empty or contains no extractable text.".into(),
            ));
        }

        let index = self.index().await?;
        let chunks = self.splitter.split_text(text);
        info!(filename, user_id, chunks = chunks.len(), "Ingesting document");

        let mut written = 0;
        for batch in chunks.chunks(EMBED_BATCH) {
            let vectors = self.embedder.embed_many(batch).await?;
            if vectors.len() != batch.len() {
                return Err(IngestError::Indexing(format!(
                    "embedding service returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            let passages = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexedPassage {
                    text: chunk.clone(),
                    source: filename.to_string(),
                    owner: user_id.to_string(),
                    vector,
                })
                .collect();
            written += index
                .insert(passages)
                .await
                .map_err(|e| IngestError::Indexing(e.to_string()))?;
        }

        info!(filename, user_id, written, "Document indexed");
        Ok(IngestReport {
            filename: filename.to_string(),
            chunks: written,
        })
    }

    /// Drop every passage of every tenant.
    pub async fn wipe_index(&self) -> Result<WipeOutcome, IngestError> {
        let index = self.index().await?;
        let outcome = index
            .wipe()
            .await
            .map_err(|e| IngestError::Indexing(e.to_string()))?;
        warn!(?outcome, "Vector index wiped");
        Ok(outcome)
    }

    async fn index(&self) -> Result<Arc<dyn VectorIndex>, IngestError> {
        let secrets = self.settings.resolve().await;
        self.index_factory.build(&secrets).map_err(|e| match e {
            docmind_core::Error::Config { message } => IngestError::Configuration(message),
            other => IngestError::Configuration(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{DownIndex, WordEmbedder};
    use docmind_core::retrieval::TenantFilter;
    use docmind_memory::{InMemoryStore, InMemoryVectorIndex, SharedIndexFactory, TypesenseIndexFactory};
    use std::time::Duration;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1))
    }

    fn ingestor(index: Arc<dyn VectorIndex>) -> Ingestor {
        Ingestor::new(
            Arc::new(WordEmbedder),
            Arc::new(SharedIndexFactory::new(index)),
            resolver(),
            &IngestConfig {
                chunk_size: 60,
                chunk_overlap: 5,
            },
        )
    }

    #[tokio::test]
    async fn rejects_non_pdf() {
        let err = ingestor(Arc::new(InMemoryVectorIndex::new()))
            .ingest_pdf("notes.txt", b"hello".to_vec(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(ref m) if m == "Only PDF files are supported."));
    }

    #[tokio::test]
    async fn garbage_pdf_is_an_extraction_error() {
        let err = ingestor(Arc::new(InMemoryVectorIndex::new()))
            .ingest_pdf("paper.pdf", b"definitely not a pdf".to_vec(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[tokio::test]
    async fn empty_text_is_a_validation_error() {
        let err = ingestor(Arc::new(InMemoryVectorIndex::new()))
            .ingest_text("paper.pdf", " \n ", "u1")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The PDF appears to be empty or contains no extractable text."
        );
    }

    #[tokio::test]
    async fn chunks_are_indexed_under_the_tenant() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let report = ingestor(index.clone())
            .ingest_text(
                "paper.pdf",
                "The transformer uses attention.\n\nResults improve on every benchmark we tried.",
                "alice",
            )
            .await
            .unwrap();

        assert_eq!(report.chunks, 2);
        assert_eq!(report.message(), "Successfully processed paper.pdf");
        assert_eq!(index.len().await, 2);

        let vector = WordEmbedder.embed_one("transformer attention").await.unwrap();
        let alice = index.query(&vector, 10, &TenantFilter::new("alice")).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].source_label, "paper.pdf");
        assert!(alice[0].text.contains("transformer"));

        let bob = index.query(&vector, 10, &TenantFilter::new("bob")).await.unwrap();
        assert!(bob.is_empty());
    }

    #[tokio::test]
    async fn unquotable_user_id_is_a_validation_error() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let ingestor = ingestor(index.clone());

        let err = ingestor.ingest_text("a.pdf", "cats", "a`b").await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        let err = ingestor
            .ingest_pdf("a.pdf", b"irrelevant".to_vec(), "a`b")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn index_failure_is_reported() {
        let err = ingestor(Arc::new(DownIndex))
            .ingest_text("paper.pdf", "some text", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Indexing(_)));
    }

    #[tokio::test]
    async fn missing_index_key_is_a_configuration_error() {
        let ingestor = Ingestor::new(
            Arc::new(WordEmbedder),
            Arc::new(TypesenseIndexFactory::new(Default::default())),
            resolver(),
            &IngestConfig::default(),
        );
        let err = ingestor.ingest_text("paper.pdf", "text", "u1").await.unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
        assert!(matches!(ingestor.wipe_index().await, Err(IngestError::Configuration(_))));
    }

    #[tokio::test]
    async fn wipe_clears_all_tenants() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let ingestor = ingestor(index.clone());
        ingestor.ingest_text("a.pdf", "cats", "alice").await.unwrap();
        ingestor.ingest_text("b.pdf", "dogs", "bob").await.unwrap();
        assert_eq!(index.len().await, 2);

        assert_eq!(ingestor.wipe_index().await.unwrap(), WipeOutcome::Deleted);
        assert!(index.is_empty().await);
        assert_eq!(ingestor.wipe_index().await.unwrap(), WipeOutcome::AlreadyEmpty);
    }
}
