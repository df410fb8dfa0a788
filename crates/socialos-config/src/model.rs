use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Top-level application configuration (`config.yml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Named LLM providers, e.g. `main`, `backup`.
    pub llm: BTreeMap<String, LlmProviderConfig>,
    pub agent: AgentConfig,
    pub checkpoint: CheckpointConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider kind. Only `openai` (and OpenAI-compatible endpoints) is supported.
    #[serde(default = "default_provider_kind")]
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_kind(),
            model: None,
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmProviderConfig {
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

fn default_provider_kind() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name of the `llm` entry used first. Defaults to the first configured entry.
    pub default_provider: Option<String>,
    /// Providers tried in order when the default fails with a retryable error.
    pub fallback_providers: Vec<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Upper bound on chat/tool round-trips within a single turn.
    pub max_tool_iterations: usize,
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            fallback_providers: Vec::new(),
            temperature: Some(0.7),
            max_tokens: None,
            max_tool_iterations: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff applied to retryable model failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per provider, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// SQLite database file. Defaults to `<config dir>/checkpoints.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3888,
        }
    }
}
