//! YAML configuration with defaults for every field.
//!
//! ```yaml
//! concurrency: 12
//! fetch:
//!   timeout_secs: 10
//!   max_attempts: 3
//!   backoff_base_ms: 1000
//!   min_content_bytes: 100      # null disables the validator
//!   accept_language: "zh-CN,zh;q=0.9,en;q=0.8"
//!   max_redirects: 10
//! extraction:
//!   base_url: "https://api.openai.com/v1"
//!   model: "gpt-3.5-turbo"
//!   timeout_secs: 30
//!   temperature: 0.0
//!   max_text_length: 8000
//!   json_mode: true
//! ```
//!
//! The API key is deliberately not part of the file; it comes from the CLI or
//! the `LLM_API_KEY` environment variable.

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

/// Longest timeout accepted for a single HTTP attempt or extraction call.
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

/// Convert a timeout in seconds to a [`Duration`] without panicking.
///
/// # Arguments
///
/// * `secs` - Timeout as read from the config file
/// * `field` - Dotted config key, used in the error message
///
/// # Returns
///
/// The duration, or [`ConfigError::Invalid`] for zero, negative, NaN, infinite
/// or values above [`MAX_TIMEOUT_SECS`].
pub fn timeout_duration(secs: f64, field: &str) -> Result<Duration, ConfigError> {
    if !(secs > 0.0 && secs <= MAX_TIMEOUT_SECS) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be in (0, {MAX_TIMEOUT_SECS}] seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))
}

/// Settings for the fetch stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout of each HTTP attempt, in seconds.
    pub timeout_secs: f64,
    pub max_attempts: u32,
    /// Backoff base; the delay after failed attempt `i` is `base * 2^i`.
    pub backoff_base_ms: u64,
    /// Minimum payload size accepted on a 2xx. `None` accepts everything.
    pub min_content_bytes: Option<usize>,
    pub accept_language: String,
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        timeout_duration(self.timeout_secs, "fetch.timeout_secs")
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            max_attempts: 3,
            backoff_base_ms: 1000,
            min_content_bytes: Some(100),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            max_redirects: 10,
        }
    }
}

/// Settings for the extraction stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub timeout_secs: f64,
    pub temperature: f32,
    /// Cleaned text longer than this many characters is cut to this prefix.
    pub max_text_length: usize,
    /// Ask the service for `response_format: json_object`.
    pub json_mode: bool,
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        timeout_duration(self.timeout_secs, "extraction.timeout_secs")
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 30.0,
            temperature: 0.0,
            max_text_length: 8000,
            json_mode: true,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upper bound on pipelines in flight at once.
    pub concurrency: usize,
    pub fetch: FetchConfig,
    pub extraction: ExtractionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            concurrency: 12,
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml_str(&yaml, path)?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.fetch.max_attempts == 0 {
            return invalid("fetch.max_attempts must be at least 1");
        }
        if self.fetch.backoff_base_ms == 0 {
            return invalid("fetch.backoff_base_ms must be positive");
        }
        self.fetch.timeout()?;
        self.extraction.timeout()?;
        if self.fetch.max_redirects == 0 {
            return invalid("fetch.max_redirects must be at least 1 (redirects are always followed)");
        }
        if self.extraction.max_text_length == 0 {
            return invalid("extraction.max_text_length must be at least 1");
        }
        if !self.extraction.temperature.is_finite() || self.extraction.temperature < 0.0 {
            return invalid("extraction.temperature must be a non-negative number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.min_content_bytes, Some(100));
        assert_eq!(config.extraction.temperature, 0.0);
        assert_eq!(config.extraction.max_text_length, 8000);
        assert!(config.extraction.json_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
fetch:
  max_attempts: 5
  min_content_bytes: null
extraction:
  model: "glm-4"
"#;
        let config = AppConfig::from_yaml_str(yaml, "inline").unwrap();
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.min_content_bytes, None);
        assert_eq!(config.fetch.backoff_base_ms, 1000);
        assert_eq!(config.extraction.model, "glm-4");
        assert_eq!(config.extraction.base_url, "https://api.openai.com/v1");
        assert_eq!(config.concurrency, 12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_yaml_str("fetch:\n  max_attempts: 0\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_yaml_str("concurrency: 0\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err =
            AppConfig::from_yaml_str("extraction:\n  max_text_length: 0\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_out_of_range_timeouts_rejected() {
        for yaml in [
            "fetch:\n  timeout_secs: -1.0\n",
            "fetch:\n  timeout_secs: 0\n",
            "fetch:\n  timeout_secs: 1.0e30\n",
            "fetch:\n  timeout_secs: .nan\n",
            "extraction:\n  timeout_secs: 1.0e30\n",
            "extraction:\n  timeout_secs: -5\n",
        ] {
            let err = AppConfig::from_yaml_str(yaml, "inline").unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml:?} accepted");
        }
        assert!(AppConfig::from_yaml_str("fetch:\n  timeout_secs: 3600\n", "inline").is_ok());
    }

    #[test]
    fn test_timeout_duration() {
        assert_eq!(
            timeout_duration(2.5, "fetch.timeout_secs").unwrap(),
            Duration::from_millis(2500)
        );
        let err = timeout_duration(f64::INFINITY, "extraction.timeout_secs").unwrap_err();
        assert!(err.to_string().contains("extraction.timeout_secs"));
        assert!(timeout_duration(-0.1, "fetch.timeout_secs").is_err());
    }

    #[test]
    fn test_zero_redirects_rejected() {
        let err = AppConfig::from_yaml_str("fetch:\n  max_redirects: 0\n", "inline").unwrap_err();
        assert!(err.to_string().contains("max_redirects"));
        assert!(AppConfig::from_yaml_str("fetch:\n  max_redirects: 1\n", "inline").is_ok());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = AppConfig::from_yaml_str("fetch: [1, 2", "broken.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = AppConfig::load(None).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = AppConfig::load(Some("/definitely/not/here.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
