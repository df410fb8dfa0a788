use std::sync::Arc;

use socialos_agents::AgentRuntime;
use socialos_common::Result;
use socialos_config::{AppConfig, CheckpointBackend, CheckpointConfig, ConfigLoader};
use socialos_db::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
use tracing::{info, warn};

const CHECKPOINT_DB_FILE: &str = "checkpoints.db";

/// Create the checkpoint store selected by `checkpoint.backend`.
pub fn build_checkpoint_store(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>> {
    match config.backend {
        CheckpointBackend::Memory => {
            info!("using in-memory checkpoint store; conversations are lost on restart");
            Ok(Arc::new(InMemoryCheckpointStore::new()))
        }
        CheckpointBackend::Sqlite => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| ConfigLoader::default_config_dir().join(CHECKPOINT_DB_FILE));
            info!("using sqlite checkpoint store at {}", path.display());
            Ok(Arc::new(SqliteCheckpointStore::open(&path)?))
        }
    }
}

/// Wire providers, tools and the checkpoint store into a runtime.
pub fn build_runtime(config: &AppConfig) -> Result<AgentRuntime> {
    let store = build_checkpoint_store(&config.checkpoint)?;
    let runtime = AgentRuntime::from_config(config, store)?;

    if runtime.provider_ids().is_empty() {
        warn!("no LLM provider configured; set OPENAI_API_KEY or add an `llm` section");
    } else {
        info!(
            providers = ?runtime.provider_ids(),
            default = ?runtime.default_provider_id(),
            tools = runtime.tools().len(),
            "agent runtime ready"
        );
    }
    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_backend_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckpointConfig {
            backend: CheckpointBackend::Sqlite,
            path: Some(dir.path().join("nested").join("state.db")),
        };

        let store = build_checkpoint_store(&config).unwrap();
        assert_eq!(store.backend_id(), "sqlite");
        assert!(dir.path().join("nested").join("state.db").exists());
    }

    #[test]
    fn default_config_builds_without_providers() {
        let runtime = build_runtime(&AppConfig::default()).unwrap();
        assert!(runtime.provider_ids().is_empty());
        assert_eq!(runtime.tools().len(), 3);
    }
}
