//! Conversation orchestration for DocMind.
//!
//! A chat request flows through [`ChatService`]:
//!
//! 1. **Resolve** secrets, recent history and the user's display name (concurrently)
//! 2. **Build** the provider and the per-request tool set from the live secrets
//! 3. **Assemble** the system prompt for this request's identity, date and tools
//! 4. **Run** the [`ConversationLoop`] until the model answers or the
//!    iteration bound is hit
//!
//! Document ingestion ([`Ingestor`]) writes into the same tenant-filtered
//! index the retrieval tool reads from.

pub mod bootstrap;
pub mod conversation;
pub mod ingest;
pub mod orchestrator;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bootstrap::Services;
pub use conversation::{
    ConversationLoop, FORCE_STOP_MESSAGE, LoopError, LoopOutcome, LoopSettings, ScratchpadEntry,
    StopReason,
};
pub use ingest::{IngestReport, Ingestor, RecursiveSplitter, extract_pdf_text};
pub use orchestrator::{ChatError, ChatService, ChatSettings, EMPTY_ANSWER_FALLBACK};
pub use prompt::PromptAssembler;
