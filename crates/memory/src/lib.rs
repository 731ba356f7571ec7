//! Metadata stores, store adapters and vector indexes for DocMind.
//!
//! - [`InMemoryStore`] and [`SqliteStore`] serve the settings, history and
//!   profile tables.
//! - [`ConfigResolver`], [`HistoryAdapter`] and [`ProfileAdapter`] wrap those
//!   tables with the degrade-on-failure policy the chat path needs.
//! - [`InMemoryVectorIndex`] and [`TypesenseIndex`] implement tenant-filtered
//!   similarity search, fronted by [`VectorSearchClient`].

pub mod adapters;
pub mod in_memory;
pub mod search;
pub mod typesense;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use adapters::{ConfigResolver, HistoryAdapter, ProfileAdapter};
pub use in_memory::InMemoryStore;
pub use search::VectorSearchClient;
pub use typesense::{TypesenseIndex, TypesenseIndexFactory};
pub use vector::{InMemoryVectorIndex, SharedIndexFactory, cosine_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
