//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the auth server base URL, request timeout, optional token
//! lifetime, and last used username. The session itself is stored as
//! `session.json` under the cache directory.
//!
//! Configuration is stored at `~/.config/authflow/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "authflow";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL used when none is configured
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow auth servers while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding `base_url`
pub const BASE_URL_ENV: &str = "AUTHFLOW_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Lifetime stamped onto freshly issued tokens; `None` means no expiry.
    pub token_ttl_minutes: Option<i64>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_ttl_minutes: None,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config directory and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.is_empty() {
                self.base_url = base_url;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().expect("create temp dir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://auth.example.com", "token_ttl_minutes": 45}"#)
            .expect("write config");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.base_url, "https://auth.example.com");
        assert_eq!(config.token_ttl_minutes, Some(45));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.last_username, None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            token_ttl_minutes: Some(30),
            last_username: Some("maxkorn".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        assert_eq!(Config::load_from(&path).expect("load"), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write config");
        assert!(Config::load_from(&path).is_err());
    }
}
