//! In-memory metadata store, useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docmind_core::error::MemoryError;
use docmind_core::message::ConversationTurn;
use docmind_core::store::{HistoryStore, MetadataStore, ProfileStore, SettingsStore};
use tokio::sync::RwLock;

/// Settings, transcripts and profiles held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    settings: Arc<RwLock<HashMap<String, String>>>,
    history: Arc<RwLock<HashMap<String, Vec<ConversationTurn>>>>,
    profiles: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed settings at construction.
    pub fn with_settings<I, K, V>(settings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = settings
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            settings: Arc::new(RwLock::new(map)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn load_settings(&self) -> Result<HashMap<String, String>, MemoryError> {
        Ok(self.settings.read().await.clone())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        self.settings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryError> {
        let history = self.history.read().await;
        let mut turns = history.get(session_id).cloned().unwrap_or_default();
        // Newest insertion first, so equal timestamps keep their log order.
        turns.reverse();
        turns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        turns.truncate(limit);
        Ok(turns)
    }

    async fn append_turn(&self, session_id: &str, turn: ConversationTurn) -> Result<(), MemoryError> {
        self.history
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn full_name(&self, user_id: &str) -> Result<Option<String>, MemoryError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn put_profile(&self, user_id: &str, full_name: &str) -> Result<(), MemoryError> {
        self.profiles
            .write()
            .await
            .insert(user_id.to_string(), full_name.to_string());
        Ok(())
    }
}

impl MetadataStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn settings_roundtrip() {
        let store = InMemoryStore::with_settings([("GROQ_API_KEY", "gsk")]);
        store.put_setting("TYPESENSE_API_KEY", "ts").await.unwrap();
        let settings = store.load_settings().await.unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings["GROQ_API_KEY"], "gsk");
    }

    #[tokio::test]
    async fn recent_turns_newest_first() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for i in 0..3 {
            store
                .append_turn(
                    "s1",
                    ConversationTurn::user(format!("m{i}")).at(base + Duration::seconds(i)),
                )
                .await
                .unwrap();
        }
        let turns = store.recent_turns("s1", 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "m2");
        assert_eq!(turns[1].content, "m1");
    }

    #[tokio::test]
    async fn sessions_are_separate() {
        let store = InMemoryStore::new();
        store
            .append_turn("a", ConversationTurn::user("hello"))
            .await
            .unwrap();
        assert!(store.recent_turns("b", 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_lookup() {
        let store = InMemoryStore::new();
        assert_eq!(store.full_name("u1").await.unwrap(), None);
        store.put_profile("u1", "Ada Lovelace").await.unwrap();
        assert_eq!(store.full_name("u1").await.unwrap().as_deref(), Some("Ada Lovelace"));
    }
}
