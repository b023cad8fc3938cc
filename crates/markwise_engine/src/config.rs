//! Engine configuration.
//!
//! Values come from `.markwise/settings.json` when present, with environment
//! variables (`MARKWISE_API_BASE`, `MARKWISE_FALLBACK_API_BASE`,
//! `MARKWISE_API_KEY`, `MARKWISE_CHAT_MODEL`) filling the gaps. A missing
//! gateway base URL is a fatal configuration error: the engine cannot run
//! degraded without its backing service.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// Default gateway model id for conversational turns.
pub const DEFAULT_CHAT_MODEL: &str = "chat-standard-1";

/// Directory under the data root holding settings and persisted state.
pub const DATA_DIR_NAME: &str = ".markwise";

/// Resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Primary gateway base URL, no trailing slash.
    pub api_base: String,
    /// Secondary gateway for chat failover, if any.
    pub fallback_api_base: Option<String>,
    /// Bearer token for the gateway, if it requires one.
    pub api_key: Option<String>,
    /// Model id sent with chat requests.
    pub chat_model: String,
    /// Root under which `.markwise/` lives.
    pub data_dir: PathBuf,
}

impl EngineConfig {
    /// Create a configuration with explicit values.
    pub fn new(api_base: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base: trim_base(api_base.into()),
            fallback_api_base: None,
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            data_dir: data_dir.into(),
        }
    }

    pub fn with_fallback(mut self, base: impl Into<String>) -> Self {
        self.fallback_api_base = Some(trim_base(base.into()));
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Load configuration from the environment.
    pub fn from_env(data_dir: impl Into<PathBuf>) -> EngineResult<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Load configuration, preferring the settings file over the environment.
    pub fn load(data_dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let data_dir = data_dir.into();
        let from_env = |key: &str| std::env::var(key).ok();
        let settings = read_settings(&data_dir);

        let pick = |file_key: &str, env_key: &str| -> Option<String> {
            settings
                .as_ref()
                .and_then(|s| s.get(file_key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| from_env(env_key).filter(|v| !v.is_empty()))
        };

        let api_base = pick("apiBase", "MARKWISE_API_BASE")
            .ok_or_else(|| EngineError::NotConfigured("MARKWISE_API_BASE".to_string()))?;

        let mut config = Self::new(api_base, data_dir);
        if let Some(base) = pick("fallbackApiBase", "MARKWISE_FALLBACK_API_BASE") {
            config = config.with_fallback(base);
        }
        if let Some(key) = pick("apiKey", "MARKWISE_API_KEY") {
            config = config.with_api_key(key);
        }
        if let Some(model) = pick("chatModel", "MARKWISE_CHAT_MODEL") {
            config = config.with_chat_model(model);
        }
        Ok(config)
    }

    /// Load configuration from an arbitrary key lookup (env in production,
    /// a map in tests).
    pub fn from_lookup<F>(data_dir: impl Into<PathBuf>, lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = lookup("MARKWISE_API_BASE")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EngineError::NotConfigured("MARKWISE_API_BASE".to_string()))?;

        let mut config = Self::new(api_base, data_dir);
        if let Some(base) = lookup("MARKWISE_FALLBACK_API_BASE").filter(|v| !v.is_empty()) {
            config = config.with_fallback(base);
        }
        if let Some(key) = lookup("MARKWISE_API_KEY").filter(|v| !v.is_empty()) {
            config = config.with_api_key(key);
        }
        if let Some(model) = lookup("MARKWISE_CHAT_MODEL").filter(|v| !v.is_empty()) {
            config = config.with_chat_model(model);
        }
        Ok(config)
    }

    /// Directory holding persisted profile and submissions.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join(DATA_DIR_NAME)
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

fn read_settings(data_dir: &Path) -> Option<serde_json::Value> {
    let path = data_dir.join(DATA_DIR_NAME).join("settings.json");
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
