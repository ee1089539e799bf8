//! Client settings stored as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding [`ClientSettings::base_url`].
pub const BASE_URL_ENV: &str = "DAMAY_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid base URL '{0}': must start with http:// or https://")]
    InvalidUrl(String),
}

/// Which chat endpoint answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Plain request/response chat.
    #[default]
    Public,
    /// Streamed reasoning trace plus maintenance commands.
    Admin,
}

/// How answers are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Styled markdown in the terminal.
    #[default]
    Terminal,
    /// The formatted HTML fragment.
    Html,
}

/// Settings for the backend connection and output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub mode: ChatMode,
    pub render: RenderMode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 120,
            mode: ChatMode::default(),
            render: RenderMode::default(),
        }
    }
}

impl ClientSettings {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), base_url = %settings.base_url, "Loaded config");
        Ok(settings)
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(base_url = %url, "Base URL overridden from environment");
            self.base_url = url.trim().to_string();
        }
        self
    }

    /// Check values that would only fail later at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
            Ok(())
        } else {
            Err(ConfigError::InvalidUrl(self.base_url.clone()))
        }
    }
}
