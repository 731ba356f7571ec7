//! Typesense vector index over HTTP.
//!
//! Passages live in one collection with the fields `content`, `source`,
//! `user_id` (faceted, used for the tenant filter) and `vec`. Search goes
//! through `multi_search` so the vector never ends up in a query string.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docmind_config::VectorConfig;
use docmind_core::error::MemoryError;
use docmind_core::retrieval::{
    IndexFactory, IndexedPassage, OWNER_FIELD, RetrievedPassage, TenantFilter, VectorIndex,
    WipeOutcome, check_owner,
};
use docmind_core::store::{SecretSet, keys};
use serde::Deserialize;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Label used for passages stored without a source.
const DEFAULT_SOURCE_LABEL: &str = "document";

/// A handle on one Typesense collection.
pub struct TypesenseIndex {
    base_url: String,
    api_key: String,
    collection: String,
    search_timeout: Duration,
    ingest_timeout: Duration,
    client: reqwest::Client,
}

impl TypesenseIndex {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        collection: impl Into<String>,
        search_timeout: Duration,
        ingest_timeout: Duration,
    ) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(search_timeout)
            .build()
            .map_err(|e| MemoryError::Index(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            collection: collection.into(),
            search_timeout,
            ingest_timeout,
            client,
        })
    }

    fn send_error(&self, e: reqwest::Error, timeout: Duration) -> MemoryError {
        if e.is_timeout() {
            MemoryError::Timeout(timeout.as_secs())
        } else {
            MemoryError::Index(e.to_string())
        }
    }

    /// `vec:([0.1,0.2,...], k:4)`
    fn vector_query(vector: &[f32], k: usize) -> String {
        let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        format!("vec:([{}], k:{k})", values.join(","))
    }

    /// Create the collection when it does not exist yet.
    async fn ensure_collection(&self, dims: usize) -> Result<(), MemoryError> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.ingest_timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.ingest_timeout))?;

        match response.status().as_u16() {
            200 => return Ok(()),
            404 => {}
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(MemoryError::Index(format!(
                    "collection lookup failed ({status}): {body}"
                )));
            }
        }

        let schema = serde_json::json!({
            "name": self.collection,
            "fields": [
                {"name": "content", "type": "string"},
                {"name": "source", "type": "string", "optional": true},
                {"name": OWNER_FIELD, "type": "string", "facet": true},
                {"name": "vec", "type": "float[]", "num_dim": dims},
            ],
        });

        let response = self
            .client
            .post(format!("{}/collections", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.ingest_timeout)
            .json(&schema)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.ingest_timeout))?;

        // 409: created concurrently by another upload.
        match response.status().as_u16() {
            200 | 201 | 409 => {
                info!(collection = %self.collection, dims, "Created vector collection");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MemoryError::Index(format!(
                    "collection create failed ({status}): {body}"
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MultiSearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    document: HitDocument,
}

#[derive(Debug, Deserialize)]
struct HitDocument {
    content: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl VectorIndex for TypesenseIndex {
    fn name(&self) -> &str {
        "typesense"
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &TenantFilter,
    ) -> Result<Vec<RetrievedPassage>, MemoryError> {
        let filter_by = filter.expression()?;
        let body = serde_json::json!({
            "searches": [{
                "collection": self.collection,
                "q": "*",
                "vector_query": Self::vector_query(vector, k),
                "filter_by": filter_by,
                "per_page": k,
                "exclude_fields": "vec",
            }]
        });

        let response = self
            .client
            .post(format!("{}/multi_search", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.search_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.search_timeout))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Index(format!("search failed ({status}): {body}")));
        }

        let parsed: MultiSearchResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Index(format!("unreadable search response: {e}")))?;

        let Some(result) = parsed.results.into_iter().next() else {
            return Ok(Vec::new());
        };

        if let Some(error) = result.error {
            if result.code == Some(404) {
                // Nothing has been ingested yet.
                debug!(collection = %self.collection, "Collection missing, treating as empty");
                return Ok(Vec::new());
            }
            return Err(MemoryError::Index(error));
        }

        Ok(result
            .hits
            .into_iter()
            .map(|hit| {
                let source = hit
                    .document
                    .source
                    .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string());
                RetrievedPassage::new(hit.document.content, source)
            })
            .collect())
    }

    async fn insert(&self, passages: Vec<IndexedPassage>) -> Result<usize, MemoryError> {
        let Some(first) = passages.first() else {
            return Ok(0);
        };
        for p in &passages {
            check_owner(&p.owner)?;
        }
        self.ensure_collection(first.vector.len()).await?;

        let mut body = String::new();
        for p in &passages {
            let line = serde_json::json!({
                "content": p.text,
                "source": p.source,
                OWNER_FIELD: p.owner,
                "vec": p.vector,
            });
            body.push_str(&line.to_string());
            body.push('\n');
        }

        let url = format!(
            "{}/collections/{}/documents/import?action=create",
            self.base_url, self.collection
        );
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "text/plain")
            .timeout(self.ingest_timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.ingest_timeout))?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        if status != 200 {
            return Err(MemoryError::Index(format!("import failed ({status}): {text}")));
        }

        let mut written = 0;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let parsed: ImportLine = serde_json::from_str(line)
                .map_err(|e| MemoryError::Index(format!("unreadable import response: {e}")))?;
            if parsed.success {
                written += 1;
            } else {
                let reason = parsed.error.unwrap_or_else(|| "unknown error".into());
                warn!(reason = %reason, "Passage rejected by index");
                return Err(MemoryError::Index(format!(
                    "import rejected after {written} documents: {reason}"
                )));
            }
        }

        debug!(collection = %self.collection, written, "Imported passages");
        Ok(written)
    }

    async fn wipe(&self) -> Result<WipeOutcome, MemoryError> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let response = self
            .client
            .delete(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.ingest_timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e, self.ingest_timeout))?;

        match response.status().as_u16() {
            200 => Ok(WipeOutcome::Deleted),
            404 => Ok(WipeOutcome::AlreadyEmpty),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MemoryError::Index(format!("delete failed ({status}): {body}")))
            }
        }
    }
}

/// Builds a [`TypesenseIndex`] from the live secret set.
///
/// `TYPESENSE_API_KEY` is required; `TYPESENSE_HOST` falls back to the
/// configured default host. A host given with a scheme is used verbatim.
pub struct TypesenseIndexFactory {
    config: VectorConfig,
}

impl TypesenseIndexFactory {
    pub fn new(config: VectorConfig) -> Self {
        Self { config }
    }

    fn base_url(&self, host: &str) -> String {
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("{}://{}:{}", self.config.protocol, host, self.config.port)
        }
    }
}

impl IndexFactory for TypesenseIndexFactory {
    fn build(&self, secrets: &SecretSet) -> docmind_core::Result<Arc<dyn VectorIndex>> {
        let api_key = secrets.require(keys::TYPESENSE_API_KEY)?;
        let host = secrets.get_or(keys::TYPESENSE_HOST, &self.config.default_host);
        let index = TypesenseIndex::new(
            self.base_url(host),
            api_key,
            &self.config.collection,
            Duration::from_secs(self.config.timeout_secs),
            Duration::from_secs(self.config.ingest_timeout_secs),
        )?;
        Ok(Arc::new(index))
    }
}
