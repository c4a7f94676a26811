use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::dispatch::FailurePolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides `base_url`.
pub const URL_ENV_VAR: &str = "AGENT_CHAT_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: Option<u64>,
    pub on_failure: FailurePolicy,
    pub image_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            on_failure: FailurePolicy::Report,
            image_dir: None,
        }
    }

    /// Load from the user config directory, falling back to defaults, then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            config.apply_base_url(&url);
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Ignores blank values.
    pub fn apply_base_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.base_url = url.to_string();
        }
    }

    /// Where `Ctrl+S` saves reply images.
    pub fn image_dir(&self) -> PathBuf {
        self.image_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("agent-chat").join("config.json"))
    }
}
