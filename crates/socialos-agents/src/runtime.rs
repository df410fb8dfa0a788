use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use socialos_common::{ConversationState, Error, Message, Result, SessionId};
use socialos_config::{AppConfig, RetryConfig};
use socialos_db::{CheckpointStore, SessionSummary};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::graph::{self, ChatSettings, Route};
use crate::openai::OpenAiProvider;
use crate::providers::{LlmProvider, LlmRequest, LlmResponse, ToolDefinition};
use crate::tools::{Tool, ToolRegistry};
use crate::turn::{ToolResultInput, TurnOutcome, TurnRequest};

/// Default bound on Chat steps within a single turn.
const MAX_TOOL_ITERATIONS: usize = 10;

const UNANSWERED_CALL: &str = "no result was provided for this tool call";

/// Exponential backoff applied to retryable provider errors before falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt per provider.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Primary provider followed by its fallbacks, presented as one provider.
struct ProviderChain<'a> {
    providers: Vec<Arc<dyn LlmProvider>>,
    retry: &'a RetryPolicy,
}

#[async_trait]
impl<'a> LlmProvider for ProviderChain<'a> {
    fn provider_id(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.provider_id())
            .unwrap_or("none")
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let mut last_error = None;

        for (index, provider) in self.providers.iter().enumerate() {
            let provider_id = provider.provider_id();
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match provider.complete(request).await {
                    Ok(response) => {
                        if index > 0 {
                            info!(
                                "using fallback provider '{}' after retryable primary failure",
                                provider_id
                            );
                        }
                        return Ok(response);
                    }
                    Err(err) => {
                        if !is_retryable_provider_error(&err) {
                            return Err(err);
                        }
                        if attempt < self.retry.max_attempts {
                            let delay = self.retry.delay_for(attempt - 1);
                            warn!(
                                "provider '{}' failed with retryable error ({}); retrying in {:?}",
                                provider_id, err, delay
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        last_error = Some(err);
                        break;
                    }
                }
            }

            if let Some(next) = self.providers.get(index + 1) {
                warn!(
                    "provider '{}' exhausted its retries; trying fallback '{}'",
                    provider_id,
                    next.provider_id()
                );
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::ModelUnavailable("no LLM provider configured".into())))
    }

    async fn health_check(&self) -> Result<bool> {
        let checks = self.providers.iter().map(|p| p.health_check());
        Ok(join_all(checks)
            .await
            .into_iter()
            .any(|ok| ok.unwrap_or(false)))
    }
}

enum Step {
    Chat,
    Route,
    ExecuteTools,
    End,
}

/// Drives turns for every session: Chat, Route and ExecuteTools, then a checkpoint.
///
/// Turns for one session are serialized; different sessions run concurrently.
pub struct AgentRuntime {
    providers: Vec<Arc<dyn LlmProvider>>,
    default_provider: Option<String>,
    fallback_provider_ids: Vec<String>,
    tools: ToolRegistry,
    store: Arc<dyn CheckpointStore>,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
    settings: ChatSettings,
    max_tool_iterations: usize,
    retry: RetryPolicy,
}

impl AgentRuntime {
    /// A runtime with the social tools registered and no providers.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: None,
            fallback_provider_ids: Vec::new(),
            tools: ToolRegistry::with_social_tools(),
            store,
            session_locks: DashMap::new(),
            settings: ChatSettings::default(),
            max_tool_iterations: MAX_TOOL_ITERATIONS,
            retry: RetryPolicy::default(),
        }
    }

    /// Build a runtime from configuration, registering one provider per `llm` entry.
    pub fn from_config(config: &AppConfig, store: Arc<dyn CheckpointStore>) -> Result<Self> {
        let mut runtime = Self::new(store);

        for (name, provider_config) in &config.llm {
            match provider_config.provider.as_str() {
                "openai" | "openai-compatible" => {}
                other => {
                    return Err(Error::Config(format!(
                        "llm.{name}: unsupported provider '{other}'"
                    )));
                }
            }

            let api_key = match (&provider_config.api_key, &provider_config.base_url) {
                (Some(key), _) => key.clone(),
                // Self-hosted compatible endpoints often need no key.
                (None, Some(_)) => String::new(),
                (None, None) => {
                    warn!("llm.{name} has no api_key; provider not registered");
                    continue;
                }
            };

            let provider = OpenAiProvider::new(api_key, provider_config.base_url.clone())
                .with_model(provider_config.model_or_default())
                .with_id(name.clone());
            runtime.register_provider(Arc::new(provider));
        }

        if let Some(default_id) = &config.agent.default_provider
            && !runtime.set_default_provider_id(default_id)
        {
            return Err(Error::Config(format!(
                "agent.default_provider '{default_id}' is not a configured llm provider"
            )));
        }
        runtime.set_fallback_provider_ids(&config.agent.fallback_providers);

        runtime.set_chat_settings(ChatSettings {
            model: String::new(),
            temperature: config.agent.temperature,
            max_tokens: config.agent.max_tokens,
        });
        runtime.set_max_tool_iterations(config.agent.max_tool_iterations);
        runtime.set_retry_policy(RetryPolicy::from(&config.agent.retry));

        Ok(runtime)
    }

    pub fn register_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        let id = provider.provider_id().to_string();
        info!("registered LLM provider: {}", id);
        if self.default_provider.is_none() {
            self.default_provider = Some(id);
        }
        self.providers.push(provider);
    }

    pub fn get_provider(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers
            .iter()
            .find(|p| p.provider_id() == id)
            .cloned()
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect()
    }

    /// Set the default provider by ID. Returns `true` if the provider exists.
    pub fn set_default_provider_id(&mut self, id: &str) -> bool {
        let exists = self.providers.iter().any(|p| p.provider_id() == id);
        if exists {
            self.default_provider = Some(id.to_string());
        }
        exists
    }

    pub fn default_provider_id(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Set the fallback provider chain (used when the primary provider fails).
    pub fn set_fallback_provider_ids(&mut self, ids: &[String]) {
        let mut deduped = Vec::new();
        for id in ids {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !deduped.iter().any(|existing: &String| existing == trimmed) {
                deduped.push(trimmed.to_string());
            }
        }
        self.fallback_provider_ids = deduped;
    }

    pub fn fallback_provider_ids(&self) -> &[String] {
        &self.fallback_provider_ids
    }

    pub fn register_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.register(tool);
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Definitions of the locally executed tools.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    pub fn set_chat_settings(&mut self, settings: ChatSettings) {
        self.settings = settings;
    }

    pub fn set_max_tool_iterations(&mut self, max: usize) {
        self.max_tool_iterations = max.max(1);
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    fn provider_chain(&self) -> Result<ProviderChain<'_>> {
        let default_id = self
            .default_provider
            .as_deref()
            .ok_or_else(|| Error::ModelUnavailable("no LLM provider configured".into()))?;

        let primary = self
            .get_provider(default_id)
            .ok_or_else(|| Error::Agent(format!("default provider '{default_id}' not found")))?;

        let mut providers = vec![primary];
        for fallback_id in &self.fallback_provider_ids {
            if providers.iter().any(|p| p.provider_id() == fallback_id) {
                continue;
            }
            if let Some(provider) = self.get_provider(fallback_id) {
                providers.push(provider);
            } else {
                warn!(
                    "configured fallback provider '{}' is not registered; skipping",
                    fallback_id
                );
            }
        }

        Ok(ProviderChain {
            providers,
            retry: &self.retry,
        })
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        self.run_turn_cancellable(request, CancellationToken::new())
            .await
    }

    /// Run a turn that stops at the next await point once `cancel` fires.
    /// A cancelled turn leaves the stored checkpoint untouched.
    #[instrument(skip_all, fields(session = %request.session_id))]
    pub async fn run_turn_cancellable(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        if request.message.is_none() && request.tool_results.is_empty() {
            return Err(Error::Agent(
                "a turn needs a message or tool results".to_string(),
            ));
        }

        let session_id = request.session_id.clone();
        let lock = self.session_lock(session_id.as_str());
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = lock.lock() => guard,
        };

        let (state, first_new) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("turn cancelled before it settled");
                return Err(Error::Cancelled);
            }
            settled = self.advance(request) => settled?,
        };

        self.store
            .save(session_id.as_str(), &state.to_checkpoint())
            .await?;

        let outcome = build_outcome(session_id, &state, first_new);
        info!(
            new_messages = outcome.new_messages.len(),
            pending_actions = outcome.pending_actions.len(),
            "turn settled"
        );
        Ok(outcome)
    }

    /// Load the session, apply the request and run the step loop until it ends.
    /// Returns the settled state and the index of the first message added this turn.
    async fn advance(&self, request: TurnRequest) -> Result<(ConversationState, usize)> {
        let mut state = self
            .store
            .load(request.session_id.as_str())
            .await?
            .unwrap_or_default();
        let first_new = state.messages.len();

        if request.user_name.is_some() {
            state.user_name = request.user_name;
        }
        if request.user_style.is_some() {
            state.user_style = request.user_style;
        }
        state.external_actions = request.external_actions;

        let resumed = resume_pending_calls(&state, request.tool_results);
        state.append(resumed);
        if let Some(message) = request.message {
            state.append([Message::user(message)]);
        }

        let chain = self.provider_chain()?;
        let mut chats = 0usize;
        let mut step = Step::Chat;
        loop {
            step = match step {
                Step::Chat => {
                    if chats == self.max_tool_iterations {
                        return Err(Error::Agent(format!(
                            "tool loop exceeded maximum of {} iterations",
                            self.max_tool_iterations
                        )));
                    }
                    chats += 1;
                    let delta = graph::chat_step(&chain, &self.tools, &self.settings, &state).await?;
                    state.append(delta);
                    Step::Route
                }
                Step::Route => match graph::route(&state) {
                    Route::ExecuteTools => Step::ExecuteTools,
                    Route::End => Step::End,
                },
                Step::ExecuteTools => {
                    let results = graph::execute_tools(&self.tools, &state).await;
                    state.append(results);
                    Step::Chat
                }
                Step::End => break,
            };
        }

        debug!(chats, "step loop ended");
        Ok((state, first_new))
    }

    pub async fn load_session(&self, session_id: &SessionId) -> Result<Option<ConversationState>> {
        self.store.load(session_id.as_str()).await
    }

    /// Delete a session's checkpoint and forget its lock once nobody else holds it.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<bool> {
        let lock = self.session_lock(session_id.as_str());
        let deleted = {
            let _guard = lock.lock().await;
            self.store.delete(session_id.as_str()).await
        };
        drop(lock);

        self.session_locks
            .remove_if(session_id.as_str(), |_, held| Arc::strong_count(held) == 1);
        deleted
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.list().await
    }

    pub async fn health_check_all(&self) -> Result<Vec<(String, bool)>> {
        let checks = self.providers.iter().map(|provider| async {
            let provider_id = provider.provider_id().to_string();
            let ok = provider.health_check().await.unwrap_or(false);
            (provider_id, ok)
        });

        Ok(join_all(checks).await)
    }
}

/// Results for the calls the previous turn left open: the host's answers where
/// it gave one, an error result otherwise. Answers for unknown call ids are dropped.
fn resume_pending_calls(
    state: &ConversationState,
    mut host_results: Vec<ToolResultInput>,
) -> Vec<Message> {
    let pending = graph::unanswered_calls(state);
    let mut resumed = Vec::with_capacity(pending.len());

    for call in pending {
        let position = host_results.iter().position(|r| r.call_id == call.call_id);
        let answer = position.map(|index| host_results.remove(index));
        resumed.push(match answer {
            Some(result) => Message::ToolResult {
                call_id: call.call_id.clone(),
                name: if result.name.is_empty() {
                    call.name.clone()
                } else {
                    result.name
                },
                content: result.content,
                is_error: result.is_error,
            },
            None => {
                debug!(tool = %call.name, call_id = %call.call_id, "closing unanswered call");
                Message::tool_error(&call.call_id, &call.name, UNANSWERED_CALL)
            }
        });
    }

    for stray in host_results {
        warn!(call_id = %stray.call_id, "dropping tool result for unknown call");
    }
    resumed
}

fn build_outcome(session_id: SessionId, state: &ConversationState, first_new: usize) -> TurnOutcome {
    let new_messages = state.messages[first_new..].to_vec();

    let reply = new_messages
        .iter()
        .rev()
        .find(|m| matches!(m, Message::Assistant { .. }))
        .map(|m| m.text().to_string())
        .unwrap_or_default();

    let pending_actions = state
        .last_message()
        .map(|m| {
            m.tool_calls()
                .iter()
                .filter(|call| state.is_external_action(&call.name))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    TurnOutcome {
        session_id,
        messages: state.messages.clone(),
        new_messages,
        reply,
        pending_actions,
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new(Arc::new(socialos_db::InMemoryCheckpointStore::new()))
    }
}

fn is_retryable_provider_error(error: &Error) -> bool {
    if matches!(error, Error::Cancelled) {
        return false;
    }
    let message = error.to_string().to_ascii_lowercase();

    if let Some(status) = extract_status_code(&message) {
        return matches!(status, 429 | 500 | 502 | 503);
    }

    let retryable_fragments = [
        "timed out",
        "timeout",
        "connection refused",
        "connection reset",
        "connection aborted",
        "temporarily unavailable",
        "dns error",
        "network error",
    ];

    retryable_fragments
        .iter()
        .any(|fragment| message.contains(fragment))
}

fn extract_status_code(message: &str) -> Option<u16> {
    for marker in ["status=", "status:", "status code"] {
        let mut search_start = 0usize;
        while let Some(offset) = message[search_start..].find(marker) {
            let marker_start = search_start + offset;
            let after_marker = marker_start + marker.len();
            let remainder = message[after_marker..].trim_start();
            let digits: String = remainder
                .chars()
                .take_while(|ch| ch.is_ascii_digit())
                .collect();

            if digits.len() >= 3
                && let Ok(status) = digits[..3].parse::<u16>()
            {
                return Some(status);
            }

            search_start = after_marker;
        }
    }
    None
}
