//! Per-request readers over the metadata store.
//!
//! None of these fail: a store error or timeout degrades to an empty secret
//! set, an empty transcript, or the placeholder display name, and is logged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docmind_core::error::MemoryError;
use docmind_core::identity::FALLBACK_DISPLAY_NAME;
use docmind_core::message::ConversationTurn;
use docmind_core::store::{HistoryStore, ProfileStore, SecretSet, SettingsStore};
use tracing::{debug, warn};

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, MemoryError>
where
    F: Future<Output = Result<T, MemoryError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| MemoryError::Timeout(timeout.as_secs()))?
}

/// Reads the live secret set.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn SettingsStore>,
    timeout: Duration,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn SettingsStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// One read of the settings table. Empty on failure.
    pub async fn resolve(&self) -> SecretSet {
        match bounded(self.timeout, self.store.load_settings()).await {
            Ok(settings) => {
                debug!(count = settings.len(), "Resolved settings");
                SecretSet::new(settings)
            }
            Err(e) => {
                warn!(error = %e, "Settings read failed, continuing with empty secret set");
                SecretSet::default()
            }
        }
    }
}

/// Loads the recent transcript of a session, oldest first.
#[derive(Clone)]
pub struct HistoryAdapter {
    store: Arc<dyn HistoryStore>,
    limit: usize,
    timeout: Duration,
}

impl HistoryAdapter {
    pub fn new(store: Arc<dyn HistoryStore>, limit: usize, timeout: Duration) -> Self {
        Self {
            store,
            limit,
            timeout,
        }
    }

    pub async fn load_recent(&self, session_id: &str) -> Vec<ConversationTurn> {
        match bounded(self.timeout, self.store.recent_turns(session_id, self.limit)).await {
            Ok(mut turns) => {
                // Store answers newest first.
                turns.reverse();
                debug!(session_id, count = turns.len(), "Loaded history");
                turns
            }
            Err(e) => {
                warn!(session_id, error = %e, "History read failed, continuing without history");
                Vec::new()
            }
        }
    }

    /// Append a turn. Unlike reads, write failures are returned.
    pub async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), MemoryError> {
        self.store.append_turn(session_id, turn).await
    }
}

/// Resolves a user's display name.
#[derive(Clone)]
pub struct ProfileAdapter {
    store: Arc<dyn ProfileStore>,
    timeout: Duration,
}

impl ProfileAdapter {
    pub fn new(store: Arc<dyn ProfileStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn load_identity(&self, user_id: &str) -> String {
        match bounded(self.timeout, self.store.full_name(user_id)).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => FALLBACK_DISPLAY_NAME.to_string(),
            Err(e) => {
                warn!(user_id, error = %e, "Profile read failed, using placeholder name");
                FALLBACK_DISPLAY_NAME.to_string()
            }
        }
    }
}
