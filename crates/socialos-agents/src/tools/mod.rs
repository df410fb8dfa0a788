use std::collections::HashMap;

use async_trait::async_trait;
use jsonschema::Validator;
use thiserror::Error;
use tracing::{debug, warn};

use crate::providers::ToolDefinition;

pub mod schema;
pub mod social;

pub use social::{GenerateImagePrompt, GeneratePostContent, SuggestPostIdeas};

/// Who runs a tool once the model asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Executed by the agent's Tool Execution step.
    Local,
    /// Advertised to the model but executed by the hosting application.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("action '{0}' is executed by the host application, not the agent")]
    ExternalAction(String),

    #[error("tool '{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },
}

/// A named, schema-constrained callable the model may request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the arguments object.
    fn input_schema(&self) -> serde_json::Value;

    fn kind(&self) -> ToolKind {
        ToolKind::Local
    }

    /// Run the tool. Arguments have already been validated and had defaults applied.
    async fn invoke(&self, args: serde_json::Value) -> Result<String, ToolError>;
}

pub fn definition_of(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        input_schema: tool.input_schema(),
    }
}

/// Name-keyed dispatch table of local tools, with one compiled argument
/// validator per tool.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    validators: HashMap<String, Validator>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three social-media helpers.
    pub fn with_social_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GeneratePostContent));
        registry.register(Box::new(SuggestPostIdeas));
        registry.register(Box::new(GenerateImagePrompt));
        registry
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match Validator::new(&tool.input_schema()) {
            Ok(validator) => {
                self.validators.insert(tool.name().to_string(), validator);
            }
            Err(e) => {
                warn!("tool '{}' has an invalid input schema: {e}", tool.name());
                self.validators.remove(tool.name());
            }
        }

        if let Some(pos) = self.tools.iter().position(|t| t.name() == tool.name()) {
            warn!("replacing already registered tool: {}", tool.name());
            self.tools[pos] = tool;
        } else {
            debug!("registered tool: {}", tool.name());
            self.tools.push(tool);
        }
    }

    pub fn list(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| definition_of(t.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `args` against the tool's schema, then invoke it.
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        if tool.kind() == ToolKind::External {
            return Err(ToolError::ExternalAction(name.to_string()));
        }

        let args = schema::apply_defaults(&tool.input_schema(), args);
        self.validate(name, &args)?;

        tool.invoke(args).await
    }

    fn validate(&self, name: &str, args: &serde_json::Value) -> Result<(), ToolError> {
        let Some(validator) = self.validators.get(name) else {
            return Ok(());
        };
        if validator.is_valid(args) {
            return Ok(());
        }

        let errors: Vec<String> = validator
            .iter_errors(args)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        Err(ToolError::InvalidArguments {
            tool: name.to_string(),
            reason: errors.join("; "),
        })
    }
}
