//! Global configuration for envdock
//!
//! Located at `~/.config/envdock/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global envdock configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub server: ServerConfig,
    pub defaults: DefaultsConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the envdock backend
    pub url: String,
    /// Environment list poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Per-request timeout in seconds (streams are exempt)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5172".to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

/// Client-side fallbacks used before server-side user settings have loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Fallback ComfyUI installation path for the create form
    pub comfyui_path: Option<String>,
    /// Fallback port for new environments
    pub port: u16,
    /// Fallback runtime for new environments ("nvidia" or "none")
    pub runtime: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            comfyui_path: None,
            port: 8188,
            runtime: "nvidia".to_string(),
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!("Loaded config from {:?}: server={}", path, config.server.url);

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.clone(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "envdock").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.server.url, "http://localhost:5172");
        assert_eq!(config.server.poll_interval_ms, 2000);
        assert_eq!(config.defaults.port, 8188);
        assert_eq!(config.defaults.runtime, "nvidia");
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let path = PathBuf::from("/tmp/nonexistent_envdock_config_test.toml");
        let config = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(config.server.url, "http://localhost:5172");
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = GlobalConfig::default();
        config.server.url = "http://envdock.local:9000".to_string();
        config.defaults.comfyui_path = Some("/opt/ComfyUI".to_string());
        config.save_to(&path).unwrap();

        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(loaded.server.url, "http://envdock.local:9000");
        assert_eq!(loaded.defaults.comfyui_path.as_deref(), Some("/opt/ComfyUI"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nurl = \"http://example:1234\"\n").unwrap();

        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(loaded.server.url, "http://example:1234");
        assert_eq!(loaded.server.poll_interval_ms, 2000);
        assert_eq!(loaded.defaults.port, 8188);
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "server = [[[").unwrap();

        assert!(GlobalConfig::load_from(&path).is_err());
    }
}
