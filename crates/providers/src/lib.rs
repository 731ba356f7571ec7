//! Language-model and embedding clients for DocMind.
//!
//! Chat models are reached through an OpenAI-compatible endpoint and built
//! per request by [`OpenAiCompatFactory`]. Embeddings come from a remote
//! prediction service, or from a local hashing embedder in offline mode.

pub mod embedding;
pub mod openai_compat;

pub use embedding::{HashingEmbedder, RemoteEmbedder};
pub use openai_compat::{OpenAiCompatFactory, OpenAiCompatProvider};
