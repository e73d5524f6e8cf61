//! PerryOps configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use perryclient::ApiConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding `api.base-url`
pub const BASE_URL_ENV: &str = "PERRYOPS_BASE_URL";

/// Main PerryOps configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend endpoint, models and timeouts
    pub api: ApiConfig,

    /// Chat REPL settings
    pub chat: ChatConfig,

    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full [`Config::load`] reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }

    /// Override the base URL, e.g. from `--base-url`
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        self
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            tracing::debug!(%url, "Config::apply_env: base url from environment");
            self.api.base_url = url;
        }
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .perryops.yml
        let local_config = PathBuf::from(".perryops.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/perryops/perryops.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("perryops").join("perryops.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Chat REPL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Characters of each message shown by `/history`
    #[serde(rename = "history-preview-chars")]
    pub history_preview_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_preview_chars: 60,
        }
    }
}
