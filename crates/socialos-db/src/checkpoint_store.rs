use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use socialos_common::{ConversationState, Result};
use tokio::sync::RwLock;
use tracing::debug;

/// Listing entry for a checkpointed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Persists the latest `ConversationState` per session.
///
/// Implementations must allow independent concurrent access for different keys.
/// Failures are reported as `Error::CheckpointUnavailable`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Backend identifier (e.g. "memory", "sqlite").
    fn backend_id(&self) -> &str;

    /// Latest snapshot for `session_id`, or `None` for an unknown session.
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>>;

    /// Overwrite the snapshot for `session_id`.
    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()>;

    /// Remove a session. Returns `true` if it existed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// All sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>>;
}

struct MemoryCheckpoint {
    state: ConversationState,
    updated_at: DateTime<Utc>,
}

/// Process-wide in-memory store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: RwLock<HashMap<String, MemoryCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn backend_id(&self) -> &str {
        "memory"
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let entries = self.entries.read().await;
        Ok(entries.get(session_id).map(|entry| entry.state.clone()))
    }

    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        debug!(
            session_id,
            messages = state.messages.len(),
            "saving in-memory checkpoint"
        );
        self.entries.write().await.insert(
            session_id.to_string(),
            MemoryCheckpoint {
                state: state.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let entries = self.entries.read().await;
        let mut sessions: Vec<SessionSummary> = entries
            .iter()
            .map(|(session_id, entry)| SessionSummary {
                session_id: session_id.clone(),
                message_count: entry.state.messages.len(),
                updated_at: entry.updated_at,
            })
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialos_common::Message;

    #[tokio::test]
    async fn unknown_session_is_absent() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("missing").await.unwrap().is_none());
        assert!(!store.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let store = InMemoryCheckpointStore::new();
        let mut state = ConversationState::new();
        state.append(vec![Message::user("first")]);
        store.save("s1", &state).await.unwrap();

        state.append(vec![Message::assistant("second")]);
        store.save("s1", &state).await.unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].message_count, 2);
    }
}
