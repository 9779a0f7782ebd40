//! Runtime configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty file is a valid
//! configuration that targets the three hosted providers.
//!
//! ```yaml
//! output_dir: results
//! request_timeout: 45s
//! circuit_breaker:
//!   failure_threshold: 3
//!   recovery_timeout: 30s
//! backends:
//!   - name: claude
//!     provider: anthropic
//!     model: claude-3-opus-20240229
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{BackendRegistry, BackendSet, CompletionConfig, ProviderError, StaticBackend};
use crate::resilience::CircuitBreakerConfig;

/// Errors loading or applying a runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Backend '{backend}' could not be created: {source}")]
    Backend {
        backend: String,
        #[source]
        source: ProviderError,
    },
}

/// Serde helpers for durations written as "45s", "1m 30s", "500ms".
pub mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name used in results and logs
    pub name: String,

    /// Provider type known to the [`BackendRegistry`]
    pub provider: String,

    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Provider-specific settings (api_key, base_url, ...)
    #[serde(default = "empty_settings")]
    pub settings: JsonValue,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn empty_settings() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl BackendConfig {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            settings: empty_settings(),
        }
    }

    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory for feedback logs and run reports
    pub output_dir: PathBuf,

    /// Per-backend call timeout
    #[serde(with = "human_duration")]
    pub request_timeout: Duration,

    pub circuit_breaker: CircuitBreakerConfig,

    pub backends: Vec<BackendConfig>,

    /// Optional scoring configuration override
    pub scoring: Option<PathBuf>,

    /// Optional threshold table override
    pub thresholds: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            request_timeout: Duration::from_secs(60),
            circuit_breaker: CircuitBreakerConfig::default(),
            backends: vec![
                BackendConfig::new("claude", "anthropic", "claude-3-opus-20240229"),
                BackendConfig::new("gpt4", "openai", "gpt-4-turbo-preview"),
                BackendConfig::new("gemini", "gemini", "gemini-pro"),
            ],
            scoring: None,
            thresholds: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. Relative scoring and threshold paths are
    /// resolved against the file's directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.scoring = config.scoring.map(|p| base.join(p));
            config.thresholds = config.thresholds.map(|p| base.join(p));
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one backend is required".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }

        let mut names = BTreeSet::new();
        for backend in &self.backends {
            if backend.name.trim().is_empty() {
                return Err(ConfigError::Invalid("backend name cannot be empty".to_string()));
            }
            if !names.insert(backend.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate backend name '{}'",
                    backend.name
                )));
            }
            if !(0.0..=1.0).contains(&backend.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}': temperature {} is outside [0, 1]",
                    backend.name, backend.temperature
                )));
            }
            if backend.max_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}': max_tokens must be greater than zero",
                    backend.name
                )));
            }
        }
        Ok(())
    }

    /// Check every backend's provider settings without creating clients.
    pub fn validate_backends(&self, registry: &BackendRegistry) -> Result<(), ConfigError> {
        for backend in &self.backends {
            registry
                .validate(&backend.provider, &backend.settings)
                .map_err(|source| ConfigError::Backend {
                    backend: backend.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Create every configured backend through `registry`.
    pub fn build_backends(&self, registry: &BackendRegistry) -> Result<BackendSet, ConfigError> {
        let mut set = BackendSet::new();
        for backend in &self.backends {
            let created = registry
                .create(&backend.provider, &backend.settings)
                .map_err(|source| ConfigError::Backend {
                    backend: backend.name.clone(),
                    source,
                })?;
            set.insert(backend.name.clone(), created, backend.completion_config());
        }
        Ok(set)
    }

    /// Canned-response stand-ins under the configured names.
    pub fn offline_backends(&self) -> BackendSet {
        let mut set = BackendSet::new();
        for backend in &self.backends {
            set.insert(
                backend.name.clone(),
                Arc::new(StaticBackend::default()),
                backend.completion_config(),
            );
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_three_providers() {
        let config = RuntimeConfig::default();
        let names: Vec<_> = config.backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["claude", "gpt4", "gemini"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let config = RuntimeConfig::from_yaml(
            r#"
output_dir: out
request_timeout: 45s
circuit_breaker:
  failure_threshold: 2
  recovery_timeout: 10s
backends:
  - name: local
    provider: static
    model: canned
    temperature: 0.2
    settings:
      response: "DECISION: hold"
"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].max_tokens, 1024);
        assert_eq!(config.backends[0].settings["response"], "DECISION: hold");
    }

    #[test]
    fn test_example_config_parses() {
        let config = RuntimeConfig::from_yaml(include_str!("../../../crucible.example.yaml")).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.backends[1].settings["max_retries"], 5);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_rejects_bad_temperature() {
        let result = RuntimeConfig::from_yaml(
            "backends:\n  - name: a\n    provider: static\n    model: m\n    temperature: 1.5\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = RuntimeConfig::from_yaml(
            "backends:\n  - {name: a, provider: static, model: m}\n  - {name: a, provider: static, model: n}\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_rejects_empty_backends_and_zero_tokens() {
        assert!(RuntimeConfig::from_yaml("backends: []\n").is_err());
        assert!(RuntimeConfig::from_yaml(
            "backends:\n  - {name: a, provider: static, model: m, max_tokens: 0}\n"
        )
        .is_err());
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(matches!(
            RuntimeConfig::from_yaml("request_timeout: soon\n"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_build_static_backends() {
        let config = RuntimeConfig::from_yaml(
            "backends:\n  - {name: a, provider: static, model: m}\n  - {name: b, provider: static, model: n}\n",
        )
        .unwrap();
        let set = config.build_backends(&BackendRegistry::with_defaults()).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.get("b").unwrap().config.model, "n");
    }

    #[test]
    fn test_unknown_provider_names_backend() {
        let config = RuntimeConfig::from_yaml(
            "backends:\n  - {name: mystery, provider: nowhere, model: m}\n",
        )
        .unwrap();
        let err = config
            .build_backends(&BackendRegistry::with_defaults())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Backend { ref backend, .. } if backend == "mystery"));
    }

    #[test]
    fn test_offline_backends_keep_names() {
        let set = RuntimeConfig::default().offline_backends();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["claude", "gemini", "gpt4"]);
        assert_eq!(set.get("claude").unwrap().config.model, "claude-3-opus-20240229");
    }

    #[test]
    fn test_relative_override_paths_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crucible.yaml");
        std::fs::write(&path, "scoring: scoring.yaml\n").unwrap();

        let config = RuntimeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.scoring, Some(dir.path().join("scoring.yaml")));
        assert!(config.thresholds.is_none());
    }
}
