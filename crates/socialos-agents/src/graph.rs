//! The three steps of a turn: Chat, Route and ExecuteTools.
//!
//! Each step reads the current `ConversationState` and returns a delta of
//! messages for the caller to append; none of them mutate history.

use std::collections::HashSet;

use socialos_common::{ConversationState, Error, Message, Result, ToolCallRequest};
use tracing::{debug, instrument, warn};

use crate::bridge;
use crate::providers::{LlmProvider, LlmRequest, ToolDefinition};
use crate::tools::{ToolError, ToolRegistry, definition_of};

const DEFAULT_USER_NAME: &str = "the user";
const DEFAULT_USER_STYLE: &str = "Friendly and conversational";

/// Model parameters applied to every chat step.
#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    /// Empty leaves model selection to the provider.
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Outcome of the routing decision after a chat step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ExecuteTools,
    End,
}

/// System prompt personalised with the user's name and writing style.
pub fn build_system_prompt(user_name: Option<&str>, user_style: Option<&str>) -> String {
    let name = user_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_USER_NAME);
    let style = user_style
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_USER_STYLE);

    format!(
        "You are a personalized AI agent for {name}.\n\n\
         Your role is to:\n\
         - Help create engaging social media posts in the user's style\n\
         - Generate creative content ideas\n\
         - Assist with image generation\n\
         - Provide suggestions for growing engagement\n\n\
         Writing Style: {style}\n\n\
         Be helpful, creative, and align your responses with the user's personality and preferences.\n\
         When generating content, make it authentic and engaging for social media."
    )
}

/// Tools offered to the model this step: bridged external actions first, then
/// the registry. On a name clash the first entry wins, so external actions
/// shadow local tools.
pub fn tool_definitions_for(
    registry: &ToolRegistry,
    state: &ConversationState,
) -> Vec<ToolDefinition> {
    let external = bridge::convert(&state.external_actions);
    let mut seen = HashSet::new();
    let mut definitions = Vec::new();

    let offered = external
        .iter()
        .chain(registry.list().iter())
        .map(|t| t.as_ref());
    for tool in offered {
        if seen.insert(tool.name().to_string()) {
            definitions.push(definition_of(tool));
        } else {
            warn!("tool name '{}' offered twice; keeping the first", tool.name());
        }
    }
    definitions
}

/// Ask the model for the next assistant message.
#[instrument(skip_all, fields(provider = provider.provider_id(), messages = state.messages.len()))]
pub async fn chat_step(
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    settings: &ChatSettings,
    state: &ConversationState,
) -> Result<Vec<Message>> {
    let request = LlmRequest {
        model: settings.model.clone(),
        messages: state.messages.clone(),
        system: Some(build_system_prompt(
            state.user_name.as_deref(),
            state.user_style.as_deref(),
        )),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        tools: tool_definitions_for(registry, state),
    };

    let response = provider.complete(&request).await.map_err(|e| match e {
        Error::ModelUnavailable(_) | Error::Cancelled => e,
        other => Error::ModelUnavailable(other.to_string()),
    })?;

    debug!(
        tool_calls = response.tool_calls.len(),
        stop_reason = ?response.stop_reason,
        "model responded"
    );
    Ok(vec![response.into_message()])
}

/// Decide what follows a chat step. Only the first tool call is inspected.
pub fn route(state: &ConversationState) -> Route {
    let Some(first) = state.last_message().and_then(|m| m.tool_calls().first()) else {
        return Route::End;
    };

    if state.is_external_action(&first.name) {
        Route::End
    } else {
        Route::ExecuteTools
    }
}

/// Run every local tool call of the last assistant message, in request order.
///
/// Each call yields exactly one `ToolResult`. Failures of any kind become error
/// results rather than aborting the turn.
pub async fn execute_tools(registry: &ToolRegistry, state: &ConversationState) -> Vec<Message> {
    let Some(last) = state.last_message() else {
        return Vec::new();
    };

    let mut results = Vec::with_capacity(last.tool_calls().len());
    for call in last.tool_calls() {
        let outcome = if state.is_external_action(&call.name) {
            // Reached only when a local call came first; the host never sees this one.
            Err(ToolError::ExternalAction(call.name.clone()))
        } else {
            registry.invoke(&call.name, call.arguments.clone()).await
        };

        let message = match outcome {
            Ok(output) => {
                debug!(tool = %call.name, call_id = %call.call_id, "tool succeeded");
                Message::tool_result(&call.call_id, &call.name, output)
            }
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.call_id, "tool failed: {err}");
                Message::tool_error(&call.call_id, &call.name, err.to_string())
            }
        };
        results.push(message);
    }
    results
}

/// Tool calls from the most recent assistant message that have no result yet.
pub fn unanswered_calls(state: &ConversationState) -> Vec<&ToolCallRequest> {
    let Some(index) = state
        .messages
        .iter()
        .rposition(|m| matches!(m, Message::Assistant { .. }))
    else {
        return Vec::new();
    };

    let answered: HashSet<&str> = state.messages[index + 1..]
        .iter()
        .filter_map(|m| match m {
            Message::ToolResult { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    state.messages[index]
        .tool_calls()
        .iter()
        .filter(|call| !answered.contains(call.call_id.as_str()))
        .collect()
}
