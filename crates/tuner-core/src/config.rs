use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Station directory service endpoints.
///
/// `lookup_host` is the round-robin DNS name published by the service; a
/// concrete mirror is resolved from it per fetch.  `mirror_override`, when
/// set, skips resolution entirely and pins all requests to the given base
/// URL (scheme included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_lookup_host")]
    pub lookup_host: String,
    #[serde(default = "default_mirror")]
    pub default_mirror: String,
    #[serde(default = "default_fallback_base")]
    pub fallback_base: String,
    #[serde(default = "default_fallback_country")]
    pub fallback_country: String,
    #[serde(default)]
    pub mirror_override: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Seconds a session may stay in Loading before the backend reports
    /// failure.
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Durable slot for the favorites id list.
    #[serde(default = "default_favorites_file")]
    pub favorites_file: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            lookup_host: default_lookup_host(),
            default_mirror: default_mirror(),
            fallback_base: default_fallback_base(),
            fallback_country: default_fallback_country(),
            mirror_override: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            favorites_file: default_favorites_file(),
        }
    }
}

fn default_lookup_host() -> String {
    "all.api.radio-browser.info".to_string()
}

fn default_mirror() -> String {
    "at1.api.radio-browser.info".to_string()
}

fn default_fallback_base() -> String {
    "https://nl1.api.radio-browser.info".to_string()
}

fn default_fallback_country() -> String {
    "us".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_load_timeout_secs() -> u64 {
    20
}

fn default_favorites_file() -> PathBuf {
    platform::data_dir().join("favorites.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.directory.lookup_host, "all.api.radio-browser.info");
        assert_eq!(config.directory.default_mirror, "at1.api.radio-browser.info");
        assert!(config.directory.fallback_base.starts_with("https://nl1."));
        assert_eq!(config.directory.fallback_country, "us");
        assert!(config.paths.favorites_file.ends_with("tuner/favorites.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [directory]
            mirror_override = "http://127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.directory.mirror_override.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(config.directory.request_timeout_secs, 15);
        assert_eq!(config.playback.load_timeout_secs, 20);
    }
}
