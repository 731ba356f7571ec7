//! Metadata store seams: operational secrets, session history and profiles.
//!
//! The store is treated as a key-value table plus an ordered log. Every read
//! happens per request; nothing here is cached.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::ConversationTurn;

/// Well-known secret keys.
pub mod keys {
    pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
    pub const TYPESENSE_API_KEY: &str = "TYPESENSE_API_KEY";
    pub const TYPESENSE_HOST: &str = "TYPESENSE_HOST";
}

/// Current operational settings, keyed by setting name.
#[derive(Clone, Default)]
pub struct SecretSet {
    values: HashMap<String, String>,
}

impl SecretSet {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// A present but blank value counts as missing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Fetch a required key, failing with a configuration error.
    pub fn require(&self, key: &str) -> crate::Result<&str> {
        self.get(key)
            .ok_or_else(|| crate::Error::config(format!("required setting {key} is not configured")))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl FromIterator<(String, String)> for SecretSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("SecretSet")
            .field("keys", &keys)
            .field("values", &"[REDACTED]")
            .finish()
    }
}

/// Admin-controlled settings table.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> Result<HashMap<String, String>, MemoryError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), MemoryError>;
}

/// Ordered per-session transcript.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The most recent `limit` turns, **newest first**.
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryError>;

    async fn append_turn(&self, session_id: &str, turn: ConversationTurn) -> Result<(), MemoryError>;
}

/// User profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when the user has no profile row.
    async fn full_name(&self, user_id: &str) -> Result<Option<String>, MemoryError>;

    async fn put_profile(&self, user_id: &str, full_name: &str) -> Result<(), MemoryError>;
}

/// A store that serves all three tables.
pub trait MetadataStore: SettingsStore + HistoryStore + ProfileStore {
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> SecretSet {
        [
            ("GROQ_API_KEY".to_string(), "gsk_live".to_string()),
            ("TYPESENSE_HOST".to_string(), "  ".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn blank_values_read_as_missing() {
        let s = secrets();
        assert_eq!(s.get(keys::GROQ_API_KEY), Some("gsk_live"));
        assert_eq!(s.get(keys::TYPESENSE_HOST), None);
        assert_eq!(s.get_or(keys::TYPESENSE_HOST, "fallback.host"), "fallback.host");
    }

    #[test]
    fn require_missing_is_config_error() {
        let err = secrets().require(keys::TYPESENSE_API_KEY).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("TYPESENSE_API_KEY"));
    }

    #[test]
    fn debug_redacts_values() {
        let rendered = format!("{:?}", secrets());
        assert!(rendered.contains("GROQ_API_KEY"));
        assert!(!rendered.contains("gsk_live"));
    }
}
