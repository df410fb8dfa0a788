pub mod bridge;
pub mod graph;
pub mod openai;
pub mod providers;
pub mod runtime;
pub mod tools;
pub mod turn;

pub use graph::{ChatSettings, Route, chat_step, execute_tools, route};
pub use openai::OpenAiProvider;
pub use providers::{LlmProvider, LlmRequest, LlmResponse, ToolDefinition, Usage};
pub use runtime::{AgentRuntime, RetryPolicy};
pub use tools::{Tool, ToolError, ToolKind, ToolRegistry};
pub use turn::{ToolResultInput, TurnOutcome, TurnRequest};

#[cfg(test)]
mod test_support;
