use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use socialos_agents::{AgentRuntime, LlmProvider, LlmRequest, LlmResponse, TurnRequest};
use socialos_common::{ActionDescriptor, Error, Message, Result, SessionId, ToolCallRequest};
use socialos_db::SqliteCheckpointStore;

struct QueueProvider {
    responses: Mutex<VecDeque<LlmResponse>>,
}

impl QueueProvider {
    fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LlmProvider for QueueProvider {
    fn provider_id(&self) -> &str {
        "queue"
    }

    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Agent("no more responses".to_string()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

fn reply(content: &str) -> LlmResponse {
    LlmResponse {
        content: content.to_string(),
        ..LlmResponse::default()
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> LlmResponse {
    LlmResponse {
        tool_calls: vec![ToolCallRequest {
            call_id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
        ..LlmResponse::default()
    }
}

fn runtime(path: &std::path::Path, responses: Vec<LlmResponse>) -> AgentRuntime {
    let store = SqliteCheckpointStore::open(path).unwrap();
    let mut runtime = AgentRuntime::new(Arc::new(store));
    runtime.register_provider(Arc::new(QueueProvider::new(responses)));
    runtime
}

#[tokio::test]
async fn conversation_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("checkpoints.db");
    let session = SessionId::from("thread-1");

    {
        let runtime = runtime(
            &db,
            vec![
                call(
                    "call_1",
                    "generatePostContent",
                    json!({ "topic": "AI", "tone": "humorous", "length": "short" }),
                ),
                reply("Why did the neural net cross the road?"),
            ],
        );
        let outcome = runtime
            .run_turn(TurnRequest::new(session.clone(), "Write a funny post about AI"))
            .await
            .unwrap();

        let brief = outcome.new_messages[2].text();
        assert!(brief.contains("Add humor and wit"));
        assert!(brief.contains("approximately 50 characters"));
    }

    let runtime = runtime(&db, vec![reply("Sure, here is another one.")]);
    let outcome = runtime
        .run_turn(TurnRequest::new(session.clone(), "Another please"))
        .await
        .unwrap();

    assert_eq!(outcome.messages.len(), 6);
    assert_eq!(outcome.messages[0], Message::user("Write a funny post about AI"));
    assert_eq!(outcome.reply, "Sure, here is another one.");

    let sessions = runtime.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].message_count, 6);
}

#[tokio::test]
async fn external_actions_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("checkpoints.db");
    let runtime = runtime(
        &db,
        vec![call("call_9", "openComposer", json!({ "draft": "Hello" }))],
    );

    let action = ActionDescriptor {
        name: "openComposer".to_string(),
        description: "Open the post composer with a draft".to_string(),
        parameters: json!({ "type": "object", "properties": { "draft": { "type": "string" } } }),
    };
    let outcome = runtime
        .run_turn(TurnRequest::new("s-ext", "draft a post").with_external_actions(vec![action]))
        .await
        .unwrap();

    assert_eq!(outcome.pending_actions[0].name, "openComposer");
    assert_eq!(outcome.reply, "");

    let saved = runtime
        .load_session(&SessionId::from("s-ext"))
        .await
        .unwrap()
        .unwrap();
    assert!(saved.external_actions.is_empty());
    assert_eq!(saved.messages, outcome.messages);

    assert!(runtime.delete_session(&SessionId::from("s-ext")).await.unwrap());
    assert!(
        runtime
            .load_session(&SessionId::from("s-ext"))
            .await
            .unwrap()
            .is_none()
    );
}
