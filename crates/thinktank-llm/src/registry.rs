//! Provider registry and dispatch.
//!
//! [`ProviderRegistry`] maps provider ids to [`LlmProvider`] implementations.
//! It is an ordinary value: the composition root builds one, registers the
//! providers it wants, and shares it read-only afterwards. Tests build their
//! own isolated registries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use thinktank_types::{
    LlmResponse, ModelConfig, ModelOptions, Result, SystemPrompt, ThinktankError,
};

use crate::cascade::{resolve_options, resolve_system_prompt};
use crate::provider::LlmProvider;
use crate::providers::{ProviderKeys, default_providers};

/// Registration and lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The provider reported an empty id.
    #[error("provider has no id")]
    MissingProviderId,

    /// A provider with this id is already registered.
    #[error("provider '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No provider is registered under the id a model refers to.
    #[error("provider '{provider_id}' is not registered (needed by model '{model_ref}')")]
    ProviderNotFound {
        provider_id: String,
        model_ref: String,
    },
}

/// Layers that feed one [`ProviderRegistry::call_provider`] call.
///
/// Everything is optional. Options merge model < group < call site; the
/// system prompt is `system_prompt` if given, else the model config's.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext<'a> {
    pub model_config: Option<&'a ModelConfig>,
    pub group_options: Option<&'a ModelOptions>,
    pub cli_options: Option<&'a ModelOptions>,
    pub system_prompt: Option<&'a SystemPrompt>,
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Provider ids mapped to implementations, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the four built-in providers.
    ///
    /// `keys` supplies explicit API keys by provider id; providers without
    /// one fall back to their environment variable at first use.
    pub fn with_defaults(keys: &ProviderKeys) -> Self {
        let mut registry = Self::new();
        for provider in default_providers(keys) {
            registry.register_or_ignore(provider);
        }
        registry
    }

    /// Register a provider under its id.
    ///
    /// Fails if the id is empty or already taken, including by the same
    /// instance.
    pub fn register_provider(
        &mut self,
        provider: Arc<dyn LlmProvider>,
    ) -> std::result::Result<(), RegistryError> {
        let id = provider.provider_id().to_string();
        if id.is_empty() {
            return Err(RegistryError::MissingProviderId);
        }
        if self.providers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        debug!(provider = %id, "registered provider");
        self.order.push(id.clone());
        self.providers.insert(id, provider);
        Ok(())
    }

    /// Register, treating an already-taken id as success.
    ///
    /// Returns `true` when the provider was added.
    pub fn register_or_ignore(&mut self, provider: Arc<dyn LlmProvider>) -> bool {
        match self.register_provider(provider) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "provider not registered");
                false
            }
        }
    }

    pub fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    /// Registered ids, in registration order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Registered providers, in registration order.
    pub fn all_providers(&self) -> Vec<Arc<dyn LlmProvider>> {
        self.order
            .iter()
            .filter_map(|id| self.providers.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.providers.clear();
        self.order.clear();
    }

    /// Resolve options and dispatch to the provider registered as
    /// `provider_id`.
    ///
    /// An unknown provider is a `ConfigError` naming both the id and the
    /// full `provider:model` reference. Provider errors pass through
    /// untouched.
    pub async fn call_provider(
        &self,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
        context: CallContext<'_>,
    ) -> Result<LlmResponse> {
        let model_options = context.model_config.and_then(|m| m.options.as_ref());
        let options = resolve_options(model_options, context.group_options, context.cli_options);
        let system_prompt = resolve_system_prompt(
            context.system_prompt,
            context.model_config.and_then(|m| m.system_prompt.as_ref()),
            None,
        );

        let Some(provider) = self.get_provider(provider_id) else {
            let model_ref = format!("{provider_id}:{model_id}");
            let known = self.provider_ids();
            let message = format!("Provider '{provider_id}' not found for model {model_ref}");
            let mut err = ThinktankError::config(message)
                .with_cause(RegistryError::ProviderNotFound {
                    provider_id: provider_id.to_string(),
                    model_ref,
                })
                .with_suggestion("Check the provider id in your model configuration");
            if !known.is_empty() {
                err = err
                    .with_suggestion(format!("Registered providers: {}", known.join(", ")))
                    .with_examples(known.iter().map(|id| format!("{id}:{model_id}")));
            }
            return Err(err);
        };

        debug!(
            provider = %provider_id,
            model = %model_id,
            options = options.len(),
            has_system_prompt = system_prompt.is_some(),
            "dispatching to provider"
        );
        provider
            .generate(prompt, model_id, &options, system_prompt)
            .await
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use thinktank_types::ErrorCategory;

    /// Records what it was called with and echoes the prompt.
    struct MockProvider {
        id: String,
        seen: Mutex<Vec<(ModelOptions, Option<String>)>>,
    }

    impl MockProvider {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn generate(
            &self,
            prompt: &str,
            model_id: &str,
            options: &ModelOptions,
            system_prompt: Option<&SystemPrompt>,
        ) -> Result<LlmResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((options.clone(), system_prompt.map(|p| p.text.clone())));
            Ok(LlmResponse::new(&self.id, model_id, format!("echo: {prompt}")))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn provider_id(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _model_id: &str,
            _options: &ModelOptions,
            _system_prompt: Option<&SystemPrompt>,
        ) -> Result<LlmResponse> {
            Err(ThinktankError::api("vendor exploded").for_provider("failing"))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_provider(MockProvider::new("alpha"))
            .unwrap();
        assert!(registry.has_provider("alpha"));
        assert!(registry.get_provider("alpha").is_some());
        assert!(!registry.has_provider("beta"));
        assert!(registry.get_provider("beta").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ProviderRegistry::new();
        let provider = MockProvider::new("alpha");
        registry.register_provider(provider.clone()).unwrap();

        let err = registry.register_provider(provider).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(ref id) if id == "alpha"));
        assert!(err.to_string().contains("alpha"));

        let err = registry
            .register_provider(MockProvider::new("alpha"))
            .unwrap_err();
        assert!(err.to_string().contains("alpha"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut registry = ProviderRegistry::new();
        let err = registry
            .register_provider(MockProvider::new(""))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingProviderId));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_allows_reregistration() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_provider(MockProvider::new("alpha"))
            .unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.provider_ids().is_empty());
        registry
            .register_provider(MockProvider::new("alpha"))
            .unwrap();
        assert!(registry.has_provider("alpha"));
    }

    #[test]
    fn enumeration_keeps_registration_order() {
        let mut registry = ProviderRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry.register_provider(MockProvider::new(id)).unwrap();
        }
        assert_eq!(registry.provider_ids(), vec!["zeta", "alpha", "mid"]);
        let ids: Vec<String> = registry
            .all_providers()
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn register_or_ignore_tolerates_duplicates() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.register_or_ignore(MockProvider::new("alpha")));
        assert!(!registry.register_or_ignore(MockProvider::new("alpha")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn with_defaults_registers_builtins() {
        let registry = ProviderRegistry::with_defaults(&ProviderKeys::default());
        assert_eq!(
            registry.provider_ids(),
            vec!["openai", "anthropic", "google", "openrouter"]
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let err = registry
            .call_provider("nonexistent", "model1", "hi", CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "ConfigError");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.message().contains("nonexistent"));
        assert!(err.message().contains("nonexistent:model1"));
        let cause = err.cause().unwrap();
        assert!(cause.to_string().contains("nonexistent:model1"));
    }

    #[tokio::test]
    async fn call_provider_merges_options() {
        let mut registry = ProviderRegistry::new();
        let mock = MockProvider::new("mock");
        registry.register_provider(mock.clone()).unwrap();

        let model = ModelConfig::new("mock", "m1")
            .with_options(ModelOptions::new().with("temperature", 0.5));
        let group = ModelOptions::new().with("maxTokens", 2000);
        let cli = ModelOptions::new().with("temperature", 0.8);

        let response = registry
            .call_provider(
                "mock",
                "m1",
                "hello",
                CallContext {
                    model_config: Some(&model),
                    group_options: Some(&group),
                    cli_options: Some(&cli),
                    system_prompt: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.text, "echo: hello");
        assert_eq!(response.provider, "mock");
        assert_eq!(response.model_id, "m1");

        let seen = mock.seen.lock().unwrap();
        let expected = ModelOptions::new()
            .with("temperature", 0.8)
            .with("maxTokens", 2000);
        assert_eq!(seen[0].0, expected);
    }

    #[tokio::test]
    async fn call_provider_falls_back_to_model_system_prompt() {
        let mut registry = ProviderRegistry::new();
        let mock = MockProvider::new("mock");
        registry.register_provider(mock.clone()).unwrap();

        let model = ModelConfig::new("mock", "m1").with_system_prompt("from model");
        let explicit = SystemPrompt::new("explicit");

        let ctx = CallContext {
            model_config: Some(&model),
            ..CallContext::default()
        };
        registry
            .call_provider("mock", "m1", "a", ctx)
            .await
            .unwrap();
        registry
            .call_provider(
                "mock",
                "m1",
                "b",
                CallContext {
                    system_prompt: Some(&explicit),
                    ..ctx
                },
            )
            .await
            .unwrap();

        let seen = mock.seen.lock().unwrap();
        assert_eq!(seen[0].1.as_deref(), Some("from model"));
        assert_eq!(seen[1].1.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_provider(Arc::new(FailingProvider))
            .unwrap();
        let err = registry
            .call_provider("failing", "m", "x", CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "[failing] vendor exploded");
        assert_eq!(err.provider_id(), Some("failing"));
    }
}
