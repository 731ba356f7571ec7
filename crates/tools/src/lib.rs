//! Tools the DocMind conversation loop can call.
//!
//! - `search_internal_documents`: query expansion plus tiered, tenant-scoped
//!   vector search over the user's uploaded documents
//! - `search_web`: optional web search, offered only when the user enables it
//!   and the capability came up at process start

pub mod expansion;
pub mod registry;
pub mod retrieval;
pub mod web_search;

pub use expansion::{QueryExpander, QueryIntent};
pub use registry::{ToolSet, ToolSetBuilder};
pub use retrieval::{
    DOCUMENT_SEARCH_TOOL, DocumentSearchTool, NO_RESULTS_SENTINEL, RetrievalOutcome, Retriever,
    TOOL_FAILURE_PREFIX,
};
pub use web_search::{DuckDuckGoSearch, WEB_SEARCH_TOOL, WebSearchTool, init_web_search};
