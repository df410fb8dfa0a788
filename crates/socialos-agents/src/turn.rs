use serde::{Deserialize, Serialize};
use socialos_common::{ActionDescriptor, Message, SessionId, ToolCallRequest};

/// One inbound turn for a session.
///
/// `message` may be omitted when the host only resumes with `tool_results` for
/// actions it ran after the previous turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub session_id: SessionId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_style: Option<String>,
    #[serde(default)]
    pub external_actions: Vec<ActionDescriptor>,
    #[serde(default)]
    pub tool_results: Vec<ToolResultInput>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<SessionId>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, name: impl Into<String>, style: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self.user_style = Some(style.into());
        self
    }

    pub fn with_external_actions(mut self, actions: Vec<ActionDescriptor>) -> Self {
        self.external_actions = actions;
        self
    }

    pub fn with_tool_results(mut self, results: Vec<ToolResultInput>) -> Self {
        self.tool_results = results;
        self
    }
}

/// Result of an external action the host executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultInput {
    pub call_id: String,
    #[serde(default)]
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultInput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: String::new(),
            content: content.into(),
            is_error: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    /// Full history after the turn.
    pub messages: Vec<Message>,
    /// Messages appended during this turn, in order.
    pub new_messages: Vec<Message>,
    /// Text of the final assistant message.
    pub reply: String,
    /// External action calls the host should execute before the next turn.
    pub pending_actions: Vec<ToolCallRequest>,
}
