//! Retrieval seams: embedding, tenant filtering and the vector index.
//!
//! The vector index is a black box that stores passages with a vector and an
//! owner, and answers nearest-neighbour queries restricted by a
//! [`TenantFilter`]. The filter is always built from the request's user id
//! and passed through unmodified.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, ProviderError};
use crate::store::SecretSet;

/// Metadata field that carries the owning tenant of a passage.
pub const OWNER_FIELD: &str = "user_id";

/// A passage returned by a similarity search, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub source_label: String,
}

impl RetrievedPassage {
    pub fn new(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_label: source_label.into(),
        }
    }
}

/// A passage ready to be written to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub text: String,
    /// Source filename.
    pub source: String,
    /// Owning tenant.
    pub owner: String,
    pub vector: Vec<f32>,
}

/// Equality filter on the owning tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantFilter {
    owner: String,
}

impl TenantFilter {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn matches(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Boolean filter expression in index syntax: `user_id:=`<owner>``.
    ///
    /// The value is backtick-quoted so ids containing filter operators
    /// cannot widen the match. Ids that cannot be quoted exactly are refused.
    pub fn expression(&self) -> Result<String, MemoryError> {
        check_owner(&self.owner)?;
        Ok(format!("{OWNER_FIELD}:=`{}`", self.owner))
    }
}

/// Rejects tenant ids the index filter syntax cannot express verbatim.
///
/// Both the write path and the query path apply this rule, so a passage is
/// only ever stored under an owner that can later be matched exactly.
pub fn check_owner(owner: &str) -> Result<(), MemoryError> {
    if owner.trim().is_empty() {
        return Err(MemoryError::InvalidTenant("tenant id is empty".into()));
    }
    if owner.contains('`') {
        return Err(MemoryError::InvalidTenant(format!(
            "tenant id {owner:?} contains a backtick"
        )));
    }
    Ok(())
}

/// Outcome of dropping the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    Deleted,
    AlreadyEmpty,
}

/// Maps text to vectors via a remote service.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input, order preserved.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Defined as `embed_many([text])[0]`.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_many(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("embedding service returned no vectors".into()))
    }
}

/// Tenant-filtered nearest-neighbour storage.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `k` passages owned by the filter's tenant, most similar first.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &TenantFilter,
    ) -> Result<Vec<RetrievedPassage>, MemoryError>;

    /// Store passages. Returns the number written.
    async fn insert(&self, passages: Vec<IndexedPassage>) -> Result<usize, MemoryError>;

    /// Drop every passage of every tenant.
    async fn wipe(&self) -> Result<WipeOutcome, MemoryError>;
}

/// Builds an index handle for one request from the live secret set.
pub trait IndexFactory: Send + Sync {
    fn build(&self, secrets: &SecretSet) -> crate::Result<Arc<dyn VectorIndex>>;
}
