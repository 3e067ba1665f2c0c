//! Built-in vendor adapters.
//!
//! | id | vendor | key env var |
//! |---|---|---|
//! | `openai` | OpenAI | `OPENAI_API_KEY` |
//! | `anthropic` | Anthropic | `ANTHROPIC_API_KEY` |
//! | `google` | Google Gemini | `GEMINI_API_KEY` |
//! | `openrouter` | OpenRouter | `OPENROUTER_API_KEY` |

pub mod anthropic;
mod chat_format;
pub mod google;
pub mod openai;
pub mod openrouter;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use thinktank_types::ModelOptions;

use crate::provider::LlmProvider;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;

/// Explicit API keys for the built-in providers, keyed by provider id.
///
/// Providers without an entry read their environment variable on first use.
#[derive(Default, Clone)]
pub struct ProviderKeys {
    keys: HashMap<String, String>,
}

impl ProviderKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.insert(provider_id, api_key);
        self
    }

    /// Set the key for `provider_id`. The first key set for a provider wins.
    pub fn insert(&mut self, provider_id: impl Into<String>, api_key: impl Into<String>) {
        self.keys
            .entry(provider_id.into())
            .or_insert_with(|| api_key.into());
    }

    pub fn get(&self, provider_id: &str) -> Option<&str> {
        self.keys.get(provider_id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn owned(&self, provider_id: &str) -> Option<String> {
        self.get(provider_id).map(str::to_string)
    }
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ProviderKeys")
            .field("providers", &ids)
            .finish()
    }
}

/// One instance of each built-in provider, in canonical order.
pub fn default_providers(keys: &ProviderKeys) -> Vec<Arc<dyn LlmProvider>> {
    vec![
        Arc::new(OpenAiProvider::new(keys.owned(openai::INFO.id))),
        Arc::new(AnthropicProvider::new(keys.owned(anthropic::INFO.id))),
        Arc::new(GoogleProvider::new(keys.owned(google::INFO.id))),
        Arc::new(OpenRouterProvider::new(keys.owned(openrouter::INFO.id))),
    ]
}

/// Vendors send `null` for list fields they have nothing to put in.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Copy every option not in `consumed` into `body` unchanged.
fn pass_through(options: &ModelOptions, consumed: &[&str], body: &mut Map<String, Value>) {
    for (key, value) in options.iter() {
        if !consumed.contains(&key.as_str()) {
            body.insert(key.clone(), value.clone());
        }
    }
}

/// Integer-valued option, normalizing `2000.0` to `2000`. Anything else is
/// forwarded as given and left for the vendor to reject.
fn token_count(options: &ModelOptions, key: &str) -> Option<Value> {
    options
        .get_u64(key)
        .map(Value::from)
        .or_else(|| options.get(key).cloned())
}

/// `"{system}\n\n{prompt}"`, for models with no system role.
fn prepend_system(system: &str, prompt: &str) -> String {
    format!("{system}\n\n{prompt}")
}
