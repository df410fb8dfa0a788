//! Presents host-supplied actions to the model as ordinary tools.
//!
//! Bridged tools are never run by the agent. When the model requests one, the
//! turn ends and the host executes it, resuming with the result next turn.

use async_trait::async_trait;
use socialos_common::ActionDescriptor;

use crate::tools::{Tool, ToolError, ToolKind};

pub struct ExternalActionTool {
    action: ActionDescriptor,
}

impl ExternalActionTool {
    pub fn new(action: ActionDescriptor) -> Self {
        Self { action }
    }
}

#[async_trait]
impl Tool for ExternalActionTool {
    fn name(&self) -> &str {
        &self.action.name
    }

    fn description(&self) -> &str {
        &self.action.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.action.parameters.clone()
    }

    fn kind(&self) -> ToolKind {
        ToolKind::External
    }

    async fn invoke(&self, _args: serde_json::Value) -> Result<String, ToolError> {
        Err(ToolError::ExternalAction(self.action.name.clone()))
    }
}

pub fn convert(actions: &[ActionDescriptor]) -> Vec<Box<dyn Tool>> {
    actions
        .iter()
        .cloned()
        .map(|action| Box::new(ExternalActionTool::new(action)) as Box<dyn Tool>)
        .collect()
}
