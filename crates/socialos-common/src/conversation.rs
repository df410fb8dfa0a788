use serde::{Deserialize, Serialize};

/// A model's request to invoke a tool, linked to its result by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        call_id: String,
        #[serde(default)]
        name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn tool_error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
            is_error: true,
        }
    }

    /// Tool calls requested by this message. Empty for anything but an assistant message.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. } => content,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResult { .. } => "tool_result",
        }
    }
}

/// An action the hosting UI can run on the agent's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Everything threaded through a turn and checkpointed between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_style: Option<String>,
    /// Only valid for the turn that supplied them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_actions: Vec<ActionDescriptor>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step's delta. History is never reordered or edited in place.
    pub fn append(&mut self, delta: impl IntoIterator<Item = Message>) {
        self.messages.extend(delta);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_external_action(&self, name: &str) -> bool {
        self.external_actions.iter().any(|action| action.name == name)
    }

    /// Snapshot suitable for persisting: external actions are per-turn and dropped.
    pub fn to_checkpoint(&self) -> Self {
        Self {
            messages: self.messages.clone(),
            user_name: self.user_name.clone(),
            user_style: self.user_style.clone(),
            external_actions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: id.to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn assistant_message_serializes_with_role_tag() {
        let msg = Message::assistant_with_calls("", vec![call("call_1", "suggestPostIdeas")]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["call_id"], "call_1");

        let plain = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert!(plain.get("tool_calls").is_none());
    }

    #[test]
    fn tool_result_deserializes_without_optional_fields() {
        let msg: Message = serde_json::from_value(json!({
            "role": "tool_result",
            "call_id": "call_9",
            "content": "done"
        }))
        .unwrap();
        assert_eq!(msg, Message::tool_result("call_9", "", "done"));
    }

    #[test]
    fn append_keeps_submission_order() {
        let mut state = ConversationState::new();
        state.append(vec![Message::user("one")]);
        state.append(vec![Message::assistant("two"), Message::user("three")]);

        let texts: Vec<&str> = state.messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(state.last_message().map(Message::role), Some("user"));
    }

    #[test]
    fn tool_calls_empty_for_non_assistant() {
        assert!(Message::user("hello").tool_calls().is_empty());
        assert!(Message::tool_error("c", "t", "boom").tool_calls().is_empty());
    }

    #[test]
    fn checkpoint_drops_external_actions() {
        let state = ConversationState {
            messages: vec![Message::user("hi")],
            user_name: Some("Ada".into()),
            user_style: None,
            external_actions: vec![ActionDescriptor {
                name: "publishPost".into(),
                description: String::new(),
                parameters: empty_object_schema(),
            }],
        };
        assert!(state.is_external_action("publishPost"));

        let snapshot = state.to_checkpoint();
        assert!(snapshot.external_actions.is_empty());
        assert_eq!(snapshot.messages, state.messages);
        assert_eq!(snapshot.user_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn action_descriptor_defaults_parameters() {
        let action: ActionDescriptor = serde_json::from_value(json!({ "name": "likePost" })).unwrap();
        assert_eq!(action.parameters["type"], "object");
        assert!(action.description.is_empty());
    }
}
