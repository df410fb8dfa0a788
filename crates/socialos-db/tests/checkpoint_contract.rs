//! Contract tests shared by every `CheckpointStore` backend.

use std::sync::Arc;

use socialos_common::{ActionDescriptor, ConversationState, Message};
use socialos_db::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};

fn backends() -> Vec<Arc<dyn CheckpointStore>> {
    vec![
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(SqliteCheckpointStore::in_memory().expect("sqlite store should open")),
    ]
}

fn sample_state(text: &str) -> ConversationState {
    let mut state = ConversationState {
        user_name: Some("Ada".to_string()),
        user_style: Some("Playful".to_string()),
        ..ConversationState::default()
    };
    state.append(vec![Message::user(text), Message::assistant("noted")]);
    state
}

#[tokio::test]
async fn save_then_load_returns_equal_state() {
    for store in backends() {
        let state = sample_state("hello");
        store.save("session-a", &state).await.unwrap();

        let loaded = store.load("session-a").await.unwrap();
        assert_eq!(loaded, Some(state), "backend {}", store.backend_id());
    }
}

#[tokio::test]
async fn unknown_session_loads_as_absent() {
    for store in backends() {
        let loaded = store.load("never-saved").await;
        assert!(
            matches!(loaded, Ok(None)),
            "backend {} should report absent, got {loaded:?}",
            store.backend_id()
        );
    }
}

#[tokio::test]
async fn sessions_are_isolated() {
    for store in backends() {
        store.save("a", &sample_state("from a")).await.unwrap();
        store.save("b", &sample_state("from b")).await.unwrap();

        let a = store.load("a").await.unwrap().unwrap();
        let b = store.load("b").await.unwrap().unwrap();
        assert_eq!(a.messages[0].text(), "from a");
        assert_eq!(b.messages[0].text(), "from b");

        assert!(store.delete("a").await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.load("b").await.unwrap().is_some());

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "b");
        assert_eq!(listed[0].message_count, 2);
    }
}

#[tokio::test]
async fn stores_what_it_is_given() {
    // Stripping per-turn actions is the runtime's job; stores keep snapshots verbatim.
    for store in backends() {
        let mut state = sample_state("with actions");
        state.external_actions.push(ActionDescriptor {
            name: "publishPost".to_string(),
            description: "Publish to the timeline".to_string(),
            parameters: serde_json::json!({ "type": "object" }),
        });
        store.save("s", &state).await.unwrap();
        assert_eq!(store.load("s").await.unwrap(), Some(state));
    }
}

#[tokio::test]
async fn concurrent_writes_to_different_sessions() {
    for store in backends() {
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("session-{i}");
                store.save(&id, &sample_state(&id)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 8);
    }
}

#[tokio::test]
async fn sqlite_checkpoints_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("checkpoints.db");

    {
        let store = SqliteCheckpointStore::open(&path).unwrap();
        store.save("persisted", &sample_state("remember me")).await.unwrap();
    }

    let reopened = SqliteCheckpointStore::open(&path).unwrap();
    let loaded = reopened.load("persisted").await.unwrap().unwrap();
    assert_eq!(loaded.messages[0].text(), "remember me");
    assert_eq!(loaded.user_name.as_deref(), Some("Ada"));
}
