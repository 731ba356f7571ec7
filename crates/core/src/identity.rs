//! Identity context embedded into every system prompt.

use serde::{Deserialize, Serialize};

/// Assistant name used when none is configured.
pub const DEFAULT_ASSISTANT_NAME: &str = "DocMind";

/// Display name used when the profile lookup misses or fails.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Who the assistant is and who it is talking to. Resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub assistant_name: String,
    pub user_display_name: String,
}

impl IdentityContext {
    pub fn new(assistant_name: impl Into<String>, user_display_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            user_display_name: user_display_name.into(),
        }
    }
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new(DEFAULT_ASSISTANT_NAME, FALLBACK_DISPLAY_NAME)
    }
}
