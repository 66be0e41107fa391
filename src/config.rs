use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "pipeline-console";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Identity provider; sign-in is only required when both are set.
    pub auth_url: Option<String>,
    pub auth_key: Option<String>,
    pub auth_access_token: Option<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_runs_poll_secs")]
    pub runs_poll_secs: u64,

    #[serde(default = "default_draft_poll_secs")]
    pub draft_poll_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("console.db").to_string_lossy().to_string()
}

fn default_runs_poll_secs() -> u64 {
    15
}

fn default_draft_poll_secs() -> u64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_url: None,
            auth_key: None,
            auth_access_token: None,
            db_path: default_db_path(),
            runs_poll_secs: default_runs_poll_secs(),
            draft_poll_secs: default_draft_poll_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path`, writing defaults there on first run.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment variables win over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("PIPELINE_API_BASE_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = var("PIPELINE_AUTH_URL").filter(|v| !v.is_empty()) {
            self.auth_url = Some(url);
        }
        if let Some(key) = var("PIPELINE_AUTH_KEY").filter(|v| !v.is_empty()) {
            self.auth_key = Some(key);
        }
    }

    pub fn validate(&mut self) -> Result<()> {
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        url::Url::parse(&self.api_base_url).map_err(|e| {
            AppError::Config(format!("invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;
        if let Some(auth_url) = &self.auth_url {
            url::Url::parse(auth_url)
                .map_err(|e| AppError::Config(format!("invalid auth_url '{}': {}", auth_url, e)))?;
        }
        if self.runs_poll_secs == 0 || self.draft_poll_secs == 0 {
            return Err(AppError::Config("poll intervals must be at least 1 second".to_string()));
        }
        Ok(())
    }

    /// Both halves of the identity provider config, if sign-in is enabled.
    pub fn auth_provider(&self) -> Option<(&str, &str)> {
        match (&self.auth_url, &self.auth_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                Some((url.as_str(), key.as_str()))
            }
            _ => None,
        }
    }

    pub fn runs_poll_interval(&self) -> Duration {
        Duration::from_secs(self.runs_poll_secs)
    }

    pub fn draft_poll_interval(&self) -> Duration {
        Duration::from_secs(self.draft_poll_secs)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}
