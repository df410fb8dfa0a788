use std::sync::Arc;
use std::time::Instant;

use socialos_agents::AgentRuntime;
use socialos_config::AppConfig;
use tokio_util::sync::CancellationToken;

/// State shared by every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub runtime: AgentRuntime,
    /// Cancelled when the server begins shutting down; in-flight turns stop without saving.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, runtime: AgentRuntime) -> Self {
        Self {
            config,
            runtime,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }
}
