//! Client configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/rebg/config.toml`. Every key is optional;
//! a missing file yields the defaults.

use std::path::Path;

use rebg_protocol::DEFAULT_ENDPOINT;
use rebg_utils::{config_file, RebgError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connection::RetryPolicy;

/// Default size of the diagnostics broadcast buffer
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 64;

/// Synchronization client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the trace backend
    pub endpoint: String,
    /// Reconnect policy after unexpected closure
    pub retry: RetryPolicy,
    /// Diagnostics a slow listener may fall behind by before losing some
    pub diagnostics_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            retry: RetryPolicy::None,
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Defaults with a different endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<ClientConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(ClientConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
        if !path.exists() {
            return Err(RebgError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| RebgError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<ClientConfig> {
        toml::from_str(content).map_err(|e| RebgError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &ClientConfig) -> Result<()> {
        let url = Url::parse(&config.endpoint).map_err(|e| {
            RebgError::config(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RebgError::config(format!(
                "endpoint must use ws:// or wss://, got '{}'",
                config.endpoint
            )));
        }

        config.retry.validate().map_err(RebgError::config)?;

        if config.diagnostics_capacity == 0 {
            return Err(RebgError::config("diagnostics_capacity must be at least 1"));
        }

        Ok(())
    }

    /// Load from an explicit path, or the default location, then validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<ClientConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn parse(content: &str) -> Result<ClientConfig> {
        ConfigLoader::parse(content, Path::new("config.toml"))
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "ws://localhost:9001");
        assert_eq!(config.retry, RetryPolicy::None);
        assert_eq!(config.diagnostics_capacity, DEFAULT_DIAGNOSTICS_CAPACITY);
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        assert_eq!(parse("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
            endpoint = "ws://10.0.0.2:9001"
            diagnostics_capacity = 16

            [retry]
            policy = "fixed-delay"
            delay_ms = 500
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "ws://10.0.0.2:9001");
        assert_eq!(config.diagnostics_capacity, 16);
        assert_eq!(
            config.retry,
            RetryPolicy::fixed(Duration::from_millis(500)).with_max_attempts(3)
        );
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = parse("endpoint = ").unwrap_err();
        assert!(matches!(err, RebgError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_parse_unknown_policy() {
        let err = parse("[retry]\npolicy = \"forever\"").unwrap_err();
        assert!(matches!(err, RebgError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validate_rejects_http_endpoint() {
        let config = ClientConfig::with_endpoint("http://localhost:9001");
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn test_validate_rejects_garbage_endpoint() {
        let config = ClientConfig::with_endpoint("localhost 9001");
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let config = ClientConfig::default().retry(RetryPolicy::fixed(Duration::ZERO));
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = ClientConfig {
            diagnostics_capacity: 0,
            ..Default::default()
        };
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = \"wss://trace.local/ws\"\n").unwrap();

        let config = ConfigLoader::load_and_validate(Some(&path)).unwrap();
        assert_eq!(config.endpoint, "wss://trace.local/ws");
    }

    #[test]
    fn test_load_from_missing_path() {
        let dir = tempdir().unwrap();
        let err = ConfigLoader::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, RebgError::ConfigNotFound(_)));
    }
}
