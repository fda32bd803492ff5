// src/infra/config.rs - Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::CaigentanError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub memory: MemoryConfig,
}

/// How the chat session reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Through the `/chat/*` backend.
    #[default]
    Http,
    /// Straight to the LLM provider with the persona prompt.
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub backend_url: String,
    /// Upper bound for every history/send/clear request.
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub mode: ChatMode,
    /// Stream deltas in direct mode.
    #[serde(default)]
    pub stream: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".into(),
            request_timeout_secs: 120,
            mode: ChatMode::Http,
            stream: false,
        }
    }
}

impl ChatConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub id: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Inline key; the environment variable wins when both are set.
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: "deepseek".into(),
            base_url: "https://api.deepseek.com".into(),
            model: "deepseek-chat".into(),
            api_key_env: "DEEPSEEK_API_KEY".into(),
            api_key: None,
            temperature: 0.7,
            max_retries: 3,
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the environment, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exchanges replayed to the model as conversation memory.
    pub max_exchanges: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_exchanges: 20 }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CaigentanError> {
        if self.chat.request_timeout_secs == 0 {
            return Err(CaigentanError::Config(
                "[chat] request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `DEEPSEEK_BASE_URL` and `DEEPSEEK_MODEL` override the provider section.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DEEPSEEK_BASE_URL") {
            if !url.trim().is_empty() {
                self.provider.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("DEEPSEEK_MODEL") {
            if !model.trim().is_empty() {
                self.provider.model = model;
            }
        }
    }
}
