//! Client configuration.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the poll interval.
pub const POLL_INTERVAL_ENV: &str = "PSSST_POLL_INTERVAL_MS";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("Poll interval must be greater than zero")]
    InvalidInterval,
}

/// Client configuration.
///
/// Loaded from defaults, then an optional JSON file, then the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Delay between two poll ticks in milliseconds (default 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ClientConfig {
    /// Create a config with the given poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(poll_interval_ms: u64) -> Self {
        Self { poll_interval_ms }
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is malformed or the values are invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config: defaults, then `path` (if given), then environment.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_json(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        tracing::debug!(poll_interval_ms = config.poll_interval_ms, "Loaded client config");
        Ok(config)
    }

    /// Apply overrides from a variable lookup such as the process environment.
    ///
    /// # Errors
    /// Returns error if a variable is set but not a valid number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        var: POLL_INTERVAL_ENV,
                        value,
                    })?;
        }
        Ok(())
    }

    /// Check invariants.
    ///
    /// # Errors
    /// Returns error if the poll interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_json() {
        let config = ClientConfig::from_json(r#"{"poll_interval_ms": 250}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 250);

        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ClientConfig::from_json(r#"{"poll_interval": 250}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = ClientConfig::from_json(r#"{"poll_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval));
    }

    #[test]
    fn test_env_override() {
        let mut config = ClientConfig::default();
        config
            .apply_overrides(|var| (var == POLL_INTERVAL_ENV).then(|| " 500 ".to_string()))
            .unwrap();
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_env_override_invalid() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_overrides(|_| Some("soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { value, .. } if value == "soon"));
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("pssst-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"poll_interval_ms": 42}"#).unwrap();
        let config = ClientConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();

        if std::env::var(POLL_INTERVAL_ENV).is_err() {
            assert_eq!(config.unwrap().poll_interval_ms, 42);
        }
    }

    #[test]
    fn test_load_rejects_zero_interval_file() {
        let path =
            std::env::temp_dir().join(format!("pssst-config-zero-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"poll_interval_ms": 0}"#).unwrap();
        let result = ClientConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ClientConfig::load(Some(Path::new("/nonexistent/pssst.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
