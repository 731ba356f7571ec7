//! System prompt assembly.
//!
//! The prompt is rebuilt for every request: the date changes and the set of
//! active tools depends on the request and on what came up at process start.

use chrono::NaiveDate;
use docmind_core::identity::IdentityContext;
use docmind_tools::{DOCUMENT_SEARCH_TOOL, NO_RESULTS_SENTINEL, TOOL_FAILURE_PREFIX, WEB_SEARCH_TOOL};

/// Builds the per-request system prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// `web_enabled` must reflect the tools actually registered, not the
    /// user's request flag.
    pub fn build_system_prompt(
        &self,
        identity: &IdentityContext,
        date: NaiveDate,
        web_enabled: bool,
    ) -> String {
        let assistant = &identity.assistant_name;
        let user = &identity.user_display_name;
        let today = date.format("%B %d, %Y");
        let failure = TOOL_FAILURE_PREFIX.trim_end();

        let tool_rule = if web_enabled {
            format!(
                "2. TOOL USAGE:\n   \
                 - Use '{DOCUMENT_SEARCH_TOOL}' for anything about the user's uploaded documents.\n   \
                 - '{WEB_SEARCH_TOOL}' is available. Use it ONLY for facts NOT present in the user's documents."
            )
        } else {
            format!(
                "2. TOOL USAGE:\n   \
                 - Use '{DOCUMENT_SEARCH_TOOL}' for anything about the user's uploaded documents.\n   \
                 - Web search is NOT available. Never call '{WEB_SEARCH_TOOL}' and never offer or ask to search the web."
            )
        };

        format!(
            "You are {assistant}, an expert research assistant. Date: {today}.\n\
             \n\
             IDENTITY CONTEXT:\n\
             - Your Name: {assistant}\n\
             - User's Name: {user}\n\
             \n\
             STRICT OPERATING RULES:\n\
             1. If the user greets you or asks who you are or who they are (\"what is my name?\"), \
             answer directly from the IDENTITY CONTEXT. DO NOT use any tool.\n\
             {tool_rule}\n\
             3. If a document search returns \"{NO_RESULTS_SENTINEL}\", tell the user plainly that \
             their documents contain nothing relevant. Do not apologize. If it starts with \
             \"{failure}\", say that document search is temporarily unavailable.\n\
             4. ONCE YOU FIND THE ANSWER, STOP. Do not call further tools.\n\
             5. FORMATTING: Use Markdown (## Headers, **bold**, - bullet lists)."
        )
    }
}

/// Instruction for the final tool-less call when the iteration bound is hit.
pub const GENERATE_STOP_INSTRUCTION: &str = "You have reached the limit on tool calls. \
Using only the tool results gathered so far, write the best final answer you can now. \
Do not call any tools.";

/// Corrective instruction after a turn with neither an answer nor a tool call.
pub const EMPTY_TURN_CORRECTION: &str = "Your last reply was empty. \
Either answer the user directly or call one of the available tools.";

/// Corrective tool message after an unusable tool call.
pub fn tool_call_correction(reason: &str, valid_tools: &[&str]) -> String {
    format!(
        "Invalid tool call: {reason}. Available tools: [{}]. \
         Call one of them with a JSON object like {{\"query\": \"...\"}}, or answer the user directly.",
        valid_tools.join(", ")
    )
}
