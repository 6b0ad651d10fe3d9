//! Configuration management.

use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default authorization server.
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Default resource API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default loopback redirect target.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Scopes needed for profile, playback state and playback control.
pub const DEFAULT_SCOPES: &str =
    "user-read-private user-read-email streaming user-read-playback-state user-modify-playback-state";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Public OAuth client identifier (no secret, PKCE only).
    pub client_id: String,
    /// Where the authorization server sends the user back.
    pub redirect_uri: String,
    /// Space separated scope list.
    pub scopes: String,
    /// Force the consent dialog even when already granted.
    pub show_dialog: bool,
    /// Authorization server base URL (`/authorize`, `/api/token`).
    pub accounts_base_url: String,
    /// Resource API base URL.
    pub api_base_url: String,
    /// Reconciler tick period in milliseconds.
    pub poll_interval_ms: u64,
    /// Local device readiness probes before giving up.
    pub device_probe_attempts: u32,
    /// Delay between readiness probes in milliseconds.
    pub device_probe_interval_ms: u64,
    /// How long the loopback receiver waits for the redirect.
    pub callback_timeout_secs: u64,
    /// Tracks per search page.
    pub search_page_size: u32,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            show_dialog: true,
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_ms: 1_000,
            device_probe_attempts: 20,
            device_probe_interval_ms: 500,
            callback_timeout_secs: 120,
            search_page_size: 20,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `paths`, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Override fields from `TOUNE_CLIENT_ID`, `TOUNE_REDIRECT_URI` and `TOUNE_LOG_LEVEL`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(client_id) = non_empty("TOUNE_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(redirect_uri) = non_empty("TOUNE_REDIRECT_URI") {
            self.redirect_uri = redirect_uri;
        }
        if let Some(log_level) = non_empty("TOUNE_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Check the fields the login flow cannot run without.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Config(
                "client_id is not set (use `toune config set-client-id` or TOUNE_CLIENT_ID)"
                    .to_string(),
            ));
        }
        let redirect = self.redirect_url()?;
        if redirect.host_str().is_none() {
            return Err(ConfigError::Config(format!(
                "redirect_uri has no host: {}",
                self.redirect_uri
            )));
        }
        self.accounts_url()?;
        self.api_url()?;
        Ok(())
    }

    /// Parsed redirect URI.
    pub fn redirect_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.redirect_uri).map_err(ConfigError::from)
    }

    /// Parsed authorization server base URL.
    pub fn accounts_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.accounts_base_url).map_err(ConfigError::from)
    }

    /// Parsed resource API base URL.
    pub fn api_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.api_base_url).map_err(ConfigError::from)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn device_probe_interval(&self) -> Duration {
        Duration::from_millis(self.device_probe_interval_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(config.show_dialog);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.device_probe_attempts, 20);
        assert_eq!(config.device_probe_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "client_id": "abc123", "log_level": "debug" }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.client_id, "abc123");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scopes, DEFAULT_SCOPES);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            client_id: "client".to_string(),
            search_page_size: 50,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.accounts_base_url, DEFAULT_ACCOUNTS_BASE_URL);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TOUNE_CLIENT_ID", "from-env"),
            ("TOUNE_REDIRECT_URI", "  "),
            ("TOUNE_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.client_id, "from-env");
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_validate_requires_client_id() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));

        let config = Config {
            client_id: "client".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_redirect() {
        let config = Config {
            client_id: "client".to_string(),
            redirect_uri: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
