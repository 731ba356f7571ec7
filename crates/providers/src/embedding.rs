//! Embedding clients.
//!
//! [`RemoteEmbedder`] talks to a Gradio-style prediction endpoint that takes
//! a list of strings and answers with one vector per string.
//! [`HashingEmbedder`] is a deterministic bag-of-words embedder used when no
//! network service is available.

use std::time::Duration;

use async_trait::async_trait;
use docmind_config::EmbeddingConfig;
use docmind_core::error::ProviderError;
use docmind_core::retrieval::Embedder;
use serde::Deserialize;
use tracing::{debug, warn};

/// Remote embedding service client.
///
/// Request body is `{"data": [[text, ...]]}`; the response carries the
/// vectors under `data[0]`.
pub struct RemoteEmbedder {
    url: String,
    client: reqwest::Client,
}

impl RemoteEmbedder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    data: Vec<Vec<Vec<f32>>>,
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn name(&self) -> &str {
        "remote"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), url = %self.url, "Requesting embeddings");

        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "data": [texts] }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Embedding service returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse embeddings: {e}")))?;

        let vectors = parsed.data.into_iter().next().unwrap_or_default();
        if vectors.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        if let Some(first) = vectors.first() {
            if first.is_empty() || vectors.iter().any(|v| v.len() != first.len()) {
                return Err(ProviderError::InvalidResponse(
                    "embedding vectors have inconsistent dimensions".into(),
                ));
            }
        }

        Ok(vectors)
    }
}

/// Feature-hashing embedder: lowercased alphanumeric tokens are hashed into
/// a fixed number of buckets and the result is L2-normalized.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(&token.to_lowercase());
            v[(h % self.dims as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
