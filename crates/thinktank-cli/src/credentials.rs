//! Per-model `apiKeyEnvVar` overrides.
//!
//! Providers read their default env var themselves. A model entry may name a
//! different variable; the key found there is passed to the provider
//! constructor explicitly.

use tracing::{debug, warn};

use thinktank_llm::ProviderKeys;
use thinktank_types::{AppConfig, ModelConfig};

/// Collect explicit keys for every configured model that names its own env
/// var. When several models of one provider name different variables, the
/// first one that is set wins.
pub fn provider_keys(config: &AppConfig) -> ProviderKeys {
    let models = config
        .models
        .iter()
        .chain(config.groups.values().flat_map(|g| &g.models));
    collect(models, |var| std::env::var(var).ok())
}

fn collect<'a>(
    models: impl Iterator<Item = &'a ModelConfig>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ProviderKeys {
    let mut keys = ProviderKeys::new();
    for model in models {
        let Some(var) = model.api_key_env_var.as_deref() else {
            continue;
        };
        match lookup(var).filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                if keys.get(&model.provider).is_none() {
                    debug!(
                        provider = %model.provider,
                        env_var = var,
                        "using model-specific API key variable"
                    );
                }
                keys.insert(model.provider.clone(), value);
            }
            None => warn!(
                model = %model.model_ref(),
                env_var = var,
                "configured API key variable is not set; falling back to the provider default"
            ),
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn model(provider: &str, id: &str, var: Option<&str>) -> ModelConfig {
        ModelConfig {
            api_key_env_var: var.map(str::to_string),
            ..ModelConfig::new(provider, id)
        }
    }

    #[test]
    fn reads_named_variables() {
        let env: HashMap<&str, &str> = [("WORK_OPENAI", "sk-work"), ("BLANK", " ")].into();
        let models = [
            model("openai", "gpt-4o", Some("WORK_OPENAI")),
            model("anthropic", "claude", Some("UNSET")),
            model("google", "gemini", Some("BLANK")),
            model("openrouter", "x/y", None),
        ];
        let keys = collect(models.iter(), |v| env.get(v).map(|s| s.to_string()));
        assert_eq!(keys.get("openai"), Some("sk-work"));
        assert!(keys.get("anthropic").is_none());
        assert!(keys.get("google").is_none());
        assert!(keys.get("openrouter").is_none());
    }

    #[test]
    fn first_set_variable_wins() {
        let env: HashMap<&str, &str> = [("A", "key-a"), ("B", "key-b")].into();
        let models = [
            model("openai", "m1", Some("MISSING")),
            model("openai", "m2", Some("A")),
            model("openai", "m3", Some("B")),
        ];
        let keys = collect(models.iter(), |v| env.get(v).map(|s| s.to_string()));
        assert_eq!(keys.get("openai"), Some("key-a"));
    }

    #[test]
    fn reads_process_env_including_groups() {
        let json = r#"{
            "groups": {"g": {"systemPrompt": {"text": "x"}, "models": [
                {
                    "provider": "google",
                    "modelId": "gemini-2.0-flash",
                    "apiKeyEnvVar": "THINKTANK_CLI_TEST_GEMINI"
                }
            ]}}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        temp_env::with_var("THINKTANK_CLI_TEST_GEMINI", Some("g-key"), || {
            assert_eq!(provider_keys(&config).get("google"), Some("g-key"));
        });
    }
}
