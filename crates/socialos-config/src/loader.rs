use std::path::{Path, PathBuf};

use socialos_common::{Error, Result};
use tracing::{debug, info};

use crate::model::{AppConfig, LlmProviderConfig};

const CONFIG_FILE_NAME: &str = "config.yml";

/// Loads `AppConfig` from YAML, `.env` and environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.socialos`, or `.socialos` when no home directory can be resolved.
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".socialos"))
            .unwrap_or_else(|| PathBuf::from(".socialos"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// Load configuration. An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", env_path.display());
        }

        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::load_file(&default_path)?
                } else {
                    info!(
                        "no config file at {}, using defaults",
                        default_path.display()
                    );
                    AppConfig::default()
                }
            }
        };

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<AppConfig> {
        if raw.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    /// Apply `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `SOCIALOS_MODEL` and
    /// `SOCIALOS_GATEWAY_PORT`. When no provider is configured and an API key is
    /// present, a `default` OpenAI provider is created.
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty());
        if config.llm.is_empty() && api_key.is_some() {
            config
                .llm
                .insert("default".to_string(), LlmProviderConfig::default());
        }

        for provider in config.llm.values_mut() {
            if provider.provider != "openai" {
                continue;
            }
            if provider.api_key.is_none() {
                provider.api_key = api_key.clone();
            }
            if provider.base_url.is_none() {
                provider.base_url = lookup("OPENAI_BASE_URL");
            }
        }

        if let Some(model) = lookup("SOCIALOS_MODEL").filter(|v| !v.trim().is_empty()) {
            for provider in config.llm.values_mut() {
                provider.model = Some(model.clone());
            }
        }

        if let Some(port) = lookup("SOCIALOS_GATEWAY_PORT").and_then(|v| v.parse().ok()) {
            config.gateway.port = port;
        }
    }
}
