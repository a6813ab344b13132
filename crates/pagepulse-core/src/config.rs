//! Application configuration management.
//!
//! Configuration is stored at `~/.config/pagepulse/config.json` and holds the
//! API base URL, where session tokens are kept, and the last used username
//! and site. The `PAGEPULSE_API_BASE` environment variable overrides the
//! stored base URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "pagepulse";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "PAGEPULSE_API_BASE";

/// Backend used when nothing else is configured (local development server).
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// JSON session file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base: Option<String>,
    #[serde(default)]
    pub token_storage: TokenStorage,
    pub timeout_secs: Option<u64>,
    /// URL of the hosted tracker script, used when printing embed snippets
    pub tracker_url: Option<String>,
    pub last_username: Option<String>,
    pub last_site_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
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

    /// Effective API base: environment, then config file, then the default.
    pub fn api_base(&self) -> String {
        let env = std::env::var(API_BASE_ENV).ok();
        resolve_api_base(env.as_deref(), self.api_base.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

fn resolve_api_base(env: Option<&str>, configured: Option<&str>) -> String {
    let base = [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_API_BASE);
    normalize_base_url(base)
}

/// Strip trailing slashes so paths can be appended with a leading `/`.
pub fn normalize_base_url(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_base_precedence() {
        assert_eq!(
            resolve_api_base(Some("https://env.example/api"), Some("https://file.example/api")),
            "https://env.example/api"
        );
        assert_eq!(
            resolve_api_base(None, Some("https://file.example/api/")),
            "https://file.example/api"
        );
        assert_eq!(resolve_api_base(None, None), DEFAULT_API_BASE);
        // Blank values fall through
        assert_eq!(resolve_api_base(Some("  "), None), DEFAULT_API_BASE);
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://x/api///"), "http://x/api");
        assert_eq!(normalize_base_url("http://x/api"), "http://x/api");
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.token_storage, TokenStorage::File);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_token_storage_parses_lowercase() {
        let config: Config = serde_json::from_str(r#"{"token_storage": "keyring"}"#).unwrap();
        assert_eq!(config.token_storage, TokenStorage::Keyring);
    }
}
