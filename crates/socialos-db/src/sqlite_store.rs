use std::path::Path;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use socialos_common::{ConversationState, Error, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::checkpoint_store::{CheckpointStore, SessionSummary};

/// SQLite-backed checkpoint store. Each session is one row holding the JSON
/// snapshot of its `ConversationState`.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening checkpoint store at {}", db_path.display());
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                unavailable(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| unavailable(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| unavailable(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| unavailable(format!("failed to open in-memory database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            message_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_checkpoints_updated
            ON checkpoints(updated_at);",
    )
    .map_err(|e| unavailable(format!("migration failed: {e}")))
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn backend_id(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| unavailable(format!("failed to load checkpoint: {e}")))?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| unavailable(format!("corrupt checkpoint for {session_id}: {e}")))
        })
        .transpose()
    }

    async fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        let json = serde_json::to_string(state)
            .map_err(|e| unavailable(format!("failed to encode checkpoint for {session_id}: {e}")))?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO checkpoints (session_id, state, message_count, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
               state = excluded.state,
               message_count = excluded.message_count,
               updated_at = excluded.updated_at",
            params![
                session_id,
                json,
                state.messages.len() as i64,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| unavailable(format!("failed to save checkpoint: {e}")))?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM checkpoints WHERE session_id = ?1",
                params![session_id],
            )
            .map_err(|e| unavailable(format!("failed to delete checkpoint: {e}")))?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, message_count, updated_at
                 FROM checkpoints
                 ORDER BY updated_at DESC",
            )
            .map_err(|e| unavailable(format!("failed to prepare session query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                let updated_raw: String = row.get(2)?;
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    message_count: count.max(0) as usize,
                    updated_at: parse_timestamp(&updated_raw),
                })
            })
            .map_err(|e| unavailable(format!("failed to list sessions: {e}")))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(|e| unavailable(format!("failed to read session row: {e}")))?);
        }
        Ok(sessions)
    }
}

fn unavailable(message: String) -> Error {
    Error::CheckpointUnavailable(message)
}

fn parse_timestamp(value: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|e| {
            warn!(
                "failed to parse timestamp '{}': {e}, falling back to now",
                value
            );
            chrono::Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialos_common::{Message, ToolCallRequest};

    #[tokio::test]
    async fn round_trip_preserves_tool_calls() {
        let store = SqliteCheckpointStore::in_memory().expect("in-memory store should open");
        let mut state = ConversationState {
            user_name: Some("Grace".to_string()),
            user_style: Some("Dry and precise".to_string()),
            ..ConversationState::default()
        };
        state.append(vec![
            Message::user("ideas please"),
            Message::assistant_with_calls(
                "",
                vec![ToolCallRequest {
                    call_id: "call_1".to_string(),
                    name: "suggestPostIdeas".to_string(),
                    arguments: serde_json::json!({ "interests": ["Rust"] }),
                }],
            ),
            Message::tool_result("call_1", "suggestPostIdeas", "- idea"),
        ]);

        store.save("s1", &state).await.expect("save should succeed");
        let loaded = store.load("s1").await.expect("load should succeed");
        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn corrupt_row_is_checkpoint_unavailable() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO checkpoints (session_id, state, updated_at) VALUES ('bad', 'not json', ?1)",
                params![chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, Error::CheckpointUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_save_is_checkpoint_unavailable() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .await
            .execute_batch("DROP TABLE checkpoints;")
            .unwrap();

        let mut state = ConversationState::default();
        state.append([Message::user("hi")]);
        let err = store.save("s1", &state).await.unwrap_err();
        assert!(matches!(err, Error::CheckpointUnavailable(_)), "{err:?}");
    }

    #[test]
    fn unusable_directory_is_checkpoint_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let err = SqliteCheckpointStore::open(&file.join("checkpoints.db"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::CheckpointUnavailable(_)), "{err:?}");
    }

    #[test]
    fn parse_timestamp_falls_back_on_garbage() {
        let before = chrono::Utc::now();
        let parsed = parse_timestamp("yesterday-ish");
        assert!(parsed >= before);
    }
}
