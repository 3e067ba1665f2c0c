//! `thinktank models` -- list the models each provider offers.
//!
//! Providers are queried concurrently. A provider that fails (usually a
//! missing API key) is reported on stderr and the others are still listed.

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use futures_util::future::join_all;
use tracing::debug;

use thinktank_llm::ProviderRegistry;
use thinktank_types::{AvailableModel, Result, ThinktankError};

/// Arguments for `thinktank models`.
#[derive(Args, Debug, Default)]
pub struct ModelsArgs {
    /// Only list models for this provider.
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Models (or the failure) for one provider.
pub type Listing = (String, Result<Vec<AvailableModel>>);

/// Run the `models` command.
pub async fn run(args: ModelsArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let registry = super::build_registry(&config);

    let listings = list_all(&registry, args.provider.as_deref()).await?;

    let mut found = Vec::new();
    let mut failed = 0usize;
    for (provider, result) in listings {
        match result {
            Ok(models) => found.push((provider, models)),
            Err(e) => {
                failed += 1;
                e.print();
            }
        }
    }

    if found.iter().all(|(_, models)| models.is_empty()) {
        println!("No models found.");
    } else {
        let count: usize = found.iter().map(|(_, m)| m.len()).sum();
        println!("{}", build_table(&found));
        println!("  {count} model(s)");
    }

    if failed > 0 && found.is_empty() {
        anyhow::bail!("no provider could list its models");
    }
    Ok(())
}

/// Query `provider` (or every registered provider) for its models.
pub async fn list_all(registry: &ProviderRegistry, provider: Option<&str>) -> Result<Vec<Listing>> {
    let providers = match provider {
        Some(id) => {
            let found = registry.get_provider(id).ok_or_else(|| {
                ThinktankError::config(format!("unknown provider '{id}'"))
                    .with_suggestion(format!(
                        "Registered providers: {}",
                        registry.provider_ids().join(", ")
                    ))
            })?;
            vec![found]
        }
        None => registry.all_providers(),
    };

    let calls = providers.into_iter().map(|p| async move {
        let id = p.provider_id().to_string();
        debug!(provider = %id, "listing models");
        let result = p.list_models(None).await;
        (id, result)
    });
    Ok(join_all(calls).await)
}

/// Render listings as a table, one row per model.
pub fn build_table(listings: &[(String, Vec<AvailableModel>)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["PROVIDER", "MODEL", "NAME", "CONTEXT", "PRICING"]);

    for (provider, models) in listings {
        for model in models {
            table.add_row([
                provider.clone(),
                model.id.clone(),
                model.display_name.clone().unwrap_or_else(|| "-".into()),
                model
                    .context_window
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".into()),
                format_pricing(model),
            ]);
        }
    }
    table
}

fn format_pricing(model: &AvailableModel) -> String {
    match &model.pricing {
        Some(p) => format!("{} in / {} out", p.prompt, p.completion),
        None => "-".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use thinktank_llm::LlmProvider;
    use thinktank_types::{LlmResponse, ModelOptions, ModelPricing, SystemPrompt};

    struct Listed(&'static str, bool);

    #[async_trait]
    impl LlmProvider for Listed {
        fn provider_id(&self) -> &str {
            self.0
        }

        async fn generate(
            &self,
            _prompt: &str,
            model_id: &str,
            _options: &ModelOptions,
            _system_prompt: Option<&SystemPrompt>,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse::new(self.0, model_id, ""))
        }

        async fn list_models(&self, _api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
            if self.1 {
                Ok(vec![AvailableModel::new(format!("{}-model", self.0))])
            } else {
                Err(ThinktankError::api("no key").for_provider(self.0))
            }
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register_provider(Arc::new(Listed("good", true)))
            .unwrap();
        registry
            .register_provider(Arc::new(Listed("bad", false)))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn lists_every_provider_and_keeps_failures() {
        let listings = list_all(&registry(), None).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].0, "good");
        assert_eq!(listings[0].1.as_ref().unwrap()[0].id, "good-model");
        assert!(listings[1].1.is_err());
    }

    #[tokio::test]
    async fn filters_by_provider() {
        let listings = list_all(&registry(), Some("bad")).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].0, "bad");
    }

    #[tokio::test]
    async fn unknown_provider_is_config_error() {
        let err = list_all(&registry(), Some("nope")).await.unwrap_err();
        assert_eq!(err.name(), "ConfigError");
        assert!(err.suggestions()[0].contains("good, bad"));
    }

    #[test]
    fn table_shows_model_details() {
        let model = AvailableModel {
            display_name: Some("GPT-4o".into()),
            context_window: Some(128_000),
            pricing: Some(ModelPricing {
                prompt: "0.0000025".into(),
                completion: "0.00001".into(),
            }),
            ..AvailableModel::new("gpt-4o")
        };
        let bare = AvailableModel::new("o3-mini");
        let rendered = build_table(&[("openai".into(), vec![model, bare])]).to_string();

        assert!(rendered.contains("PROVIDER"));
        assert!(rendered.contains("GPT-4o"));
        assert!(rendered.contains("128000"));
        assert!(rendered.contains("0.0000025 in / 0.00001 out"));
        assert!(rendered.contains("o3-mini"));
    }
}
