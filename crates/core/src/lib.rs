//! # DocMind Core
//!
//! Domain types, traits, and error definitions for the DocMind retrieval
//! orchestrator. This crate has **zero framework dependencies**; it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, embedding service, vector
//! index, metadata store) is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod identity;
pub mod message;
pub mod provider;
pub mod request;
pub mod retrieval;
pub mod store;
pub mod tool;
pub mod web;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use identity::IdentityContext;
pub use message::{ConversationTurn, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderFactory, ProviderRequest, ProviderResponse, ToolDefinition};
pub use request::{ChatRequest, ChatResponse};
pub use retrieval::{
    Embedder, IndexFactory, IndexedPassage, RetrievedPassage, TenantFilter, VectorIndex, WipeOutcome,
};
pub use store::{HistoryStore, MetadataStore, ProfileStore, SecretSet, SettingsStore};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use web::{WebResult, WebSearchBackend};
