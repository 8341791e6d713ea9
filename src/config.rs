//! Transcription service settings, read from the environment (and `.env`).

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "whisper-1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive whole number of seconds, got {value:?}")]
    InvalidTimeout { key: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings for the remote transcription service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriberConfig {
    /// API root, the `audio/transcriptions` path is appended
    pub base_url: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Upper bound on a single request, connect through response body
    pub timeout: Duration,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TranscriberConfig {
    /// Read `OPENAI_BASE_URL`, `MEDSCRIBE_MODEL` and `MEDSCRIBE_TIMEOUT_SECS`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            if base_url.trim().is_empty() {
                return Err(ConfigError::Empty("OPENAI_BASE_URL"));
            }
            config = config.with_base_url(base_url.trim());
        }

        if let Some(model) = lookup("MEDSCRIBE_MODEL") {
            if model.trim().is_empty() {
                return Err(ConfigError::Empty("MEDSCRIBE_MODEL"));
            }
            config = config.with_model(model.trim());
        }

        if let Some(value) = lookup("MEDSCRIBE_TIMEOUT_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout {
                    key: "MEDSCRIBE_TIMEOUT_SECS",
                    value: value.clone(),
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = TranscriberConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TranscriberConfig::default());
        assert_eq!(config.model, "whisper-1");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = TranscriberConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("MEDSCRIBE_MODEL", "whisper-large"),
            ("MEDSCRIBE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "whisper-large");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values() {
        let err = TranscriberConfig::from_lookup(lookup(&[("MEDSCRIBE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let err =
            TranscriberConfig::from_lookup(lookup(&[("MEDSCRIBE_TIMEOUT_SECS", "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidTimeout {
                key: "MEDSCRIBE_TIMEOUT_SECS",
                value: "0".to_string()
            }
        );

        let err = TranscriberConfig::from_lookup(lookup(&[("MEDSCRIBE_MODEL", " ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty("MEDSCRIBE_MODEL"));
    }

    #[test]
    fn test_builder() {
        let config = TranscriberConfig::default()
            .with_base_url("http://127.0.0.1:1")
            .with_model("m")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "http://127.0.0.1:1");
        assert_eq!(config.model, "m");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
