use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::heuristics::KnownDurations;
use crate::core::overrides::{default_manual_overrides, ManualOverrideEntry};
use crate::core::policy::ProtectionPolicy;

pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub policy: ProtectionPolicy,
    pub bulk: BulkConfig,
    pub known_durations: KnownDurations,
    pub manual_overrides: Vec<ManualOverrideEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            policy: ProtectionPolicy::default(),
            bulk: BulkConfig::default(),
            known_durations: KnownDurations::default(),
            manual_overrides: default_manual_overrides(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub youtube_api_key: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Read the public watch page when the Data API gives nothing.
    pub scrape_watch_page: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            timeout_secs: 5,
            user_agent: format!("vidlen/{}", env!("CARGO_PKG_VERSION")),
            scrape_watch_page: false,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, ignoring blanks.
    pub fn api_key(&self) -> Option<&str> {
        self.youtube_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub namespace: String,
    pub ttl_secs: u64,
    pub heuristic_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "vidlen".to_string(),
            ttl_secs: 604_800,
            heuristic_ttl_secs: 86_400,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn heuristic_ttl(&self) -> Duration {
        Duration::from_secs(self.heuristic_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { delay_ms: 500 }
    }
}

impl BulkConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Read a TOML file. Sections left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(config.with_env())
    }

    /// Defaults, or the file at `path` when one is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default().with_env()),
        }
    }

    /// Fill an unset API key from the environment.
    pub fn with_env(mut self) -> Self {
        if self.api.api_key().is_none() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.trim().is_empty() {
                    self.api.youtube_api_key = Some(key);
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.timeout(), Duration::from_secs(5));
        assert_eq!(config.cache.ttl_secs, 604_800);
        assert_eq!(config.cache.heuristic_ttl_secs, 86_400);
        assert_eq!(config.bulk.delay(), Duration::from_millis(500));
        assert_eq!(config.policy.tolerance_secs, 10);
        assert_eq!(config.known_durations.get("EEZkQv25uEs"), Some(729));
        assert_eq!(config.manual_overrides.len(), 5);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
youtube_api_key = "abc"
scrape_watch_page = true

[policy]
tolerance_secs = 3

[known_durations]
xyz = 42

[[manual_overrides]]
internal_id = 7
platform_id = "xyz"
seconds = 40
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.api_key(), Some("abc"));
        assert!(config.api.scrape_watch_page);
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.policy.tolerance_secs, 3);
        assert_eq!(config.policy.max_relative_change, 0.5);
        assert_eq!(config.known_durations.get("xyz"), Some(42));
        assert_eq!(config.known_durations.get("EEZkQv25uEs"), None);
        assert_eq!(config.manual_overrides.len(), 1);
        assert_eq!(config.manual_overrides[0].platform_id.as_deref(), Some("xyz"));
        assert_eq!(config.cache.namespace, "vidlen");
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbroken").unwrap();
        match Config::load(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {:?}", other),
        }

        assert!(matches!(
            Config::load("/nonexistent/vidlen.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_blank_key_is_unset() {
        let api = ApiConfig {
            youtube_api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(api.api_key(), None);
    }
}
