//! Backend factories and the registry that maps provider types to them.
//!
//! ```ignore
//! let registry = BackendRegistry::with_defaults();
//! let backend = registry.create("openai", &settings)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{ModelBackend, ProviderError, StaticBackendFactory};

/// Creates backends of one provider type from JSON settings.
pub trait BackendFactory: Send + Sync {
    /// Provider type used in configuration (e.g. "anthropic", "static").
    fn provider_type(&self) -> &'static str;

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn ModelBackend>, ProviderError>;

    /// Check settings without creating a backend.
    fn validate_settings(&self, settings: &JsonValue) -> Result<(), ProviderError>;

    fn description(&self) -> &'static str {
        "Model backend"
    }
}

/// Provider type name to factory.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory of the same type.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    pub fn create(
        &self,
        provider_type: &str,
        settings: &JsonValue,
    ) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        self.factory(provider_type)?.create(settings)
    }

    pub fn validate(&self, provider_type: &str, settings: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_settings(settings)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn BackendFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    /// Registry with the static backend and every compiled-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticBackendFactory));
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicBackendFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiBackendFactory));
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiBackendFactory));
        registry
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
