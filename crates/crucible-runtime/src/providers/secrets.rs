//! API key handling for backend adapters.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read and are
//! only exposed when an HTTP request is built.
//!
//! ```ignore
//! let key = ApiCredential::from_settings_or_env(&settings, OPENAI_API_KEY_ENV, "OpenAI API key")?;
//! request.bearer_auth(key.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Environment variable for Anthropic keys.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable for OpenAI keys.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable for Google (Gemini) keys.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Settings key checked before the environment.
pub const API_KEY_SETTING: &str = "api_key";

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Backend `settings` in the runtime config
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// An API key that prints as `[REDACTED]`.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read `api_key` from backend settings, falling back to `env_var`.
    ///
    /// Empty values count as missing.
    pub fn from_settings_or_env(
        settings: &JsonValue,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = settings[API_KEY_SETTING].as_str().filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        match std::env::var(env_var) {
            Ok(value) if !value.is_empty() => {
                Ok(Self::new(value, CredentialSource::Environment, name))
            }
            _ => Err(ProviderError::NotConfigured(format!(
                "{} required: set '{}' in backend settings or the {} environment variable",
                name, API_KEY_SETTING, env_var
            ))),
        }
    }

    /// Whether a key could be loaded, without loading it.
    pub fn is_available(settings: &JsonValue, env_var: &str) -> bool {
        settings[API_KEY_SETTING]
            .as_str()
            .map(|v| !v.is_empty())
            .unwrap_or(false)
            || std::env::var(env_var).map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// The raw key. Call only where a request header is set.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
