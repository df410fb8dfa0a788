use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use socialos_common::{Error, Result, ToolCallRequest};

use crate::providers::{LlmProvider, LlmRequest, LlmResponse};

/// Replays queued responses in order and records every request it sees.
pub struct ScriptedProvider {
    id: String,
    script: Mutex<VecDeque<Result<LlmResponse>>>,
    requests: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<LlmResponse>>) -> Self {
        Self::named("scripted", script)
    }

    pub fn named(id: &str, script: Vec<Result<LlmResponse>>) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Agent("script exhausted".to_string())))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

pub fn text(content: &str) -> Result<LlmResponse> {
    Ok(LlmResponse {
        content: content.to_string(),
        ..LlmResponse::default()
    })
}

pub fn calls(calls: &[(&str, &str, serde_json::Value)]) -> Result<LlmResponse> {
    Ok(LlmResponse {
        tool_calls: calls
            .iter()
            .map(|(id, name, arguments)| ToolCallRequest {
                call_id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.clone(),
            })
            .collect(),
        stop_reason: Some("tool_calls".to_string()),
        ..LlmResponse::default()
    })
}
