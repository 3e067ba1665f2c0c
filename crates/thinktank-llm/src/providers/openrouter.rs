//! OpenRouter, speaking the OpenAI chat format.
//!
//! Model ids are vendor-qualified (`anthropic/claude-3.5-sonnet`,
//! `meta-llama/llama-3-70b:free`). Requests carry the `HTTP-Referer` and
//! `X-Title` attribution headers OpenRouter uses for app rankings.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use thinktank_types::{
    AvailableModel, LlmResponse, ModelOptions, ModelPricing, Result, SystemPrompt,
};

use super::chat_format::{self, ChatCompletion, ModelList};
use super::{pass_through, token_count};
use crate::http::{AuthScheme, LazyClient, VendorClient};
use crate::provider::LlmProvider;
use crate::provider_errors::{ProviderInfo, VendorError, classify_error, classify_listing_error};

pub static INFO: ProviderInfo = ProviderInfo {
    id: "openrouter",
    display_name: "OpenRouter",
    api_key_env: "OPENROUTER_API_KEY",
    console_url: "https://openrouter.ai/keys",
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const APP_TITLE: &str = "thinktank";
const APP_REFERER: &str = env!("CARGO_PKG_REPOSITORY");

/// camelCase option → OpenRouter parameter.
const PARAMS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("topP", "top_p"),
    ("topK", "top_k"),
    ("frequencyPenalty", "frequency_penalty"),
    ("presencePenalty", "presence_penalty"),
    ("repetitionPenalty", "repetition_penalty"),
];

pub struct OpenRouterProvider {
    client: LazyClient,
}

impl OpenRouterProvider {
    /// `api_key` overrides `OPENROUTER_API_KEY`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: LazyClient::new(&INFO, api_key, DEFAULT_BASE_URL, AuthScheme::Bearer)
                .with_header("http-referer", APP_REFERER)
                .with_header("x-title", APP_TITLE),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    pub fn build_request(
        model_id: &str,
        prompt: &str,
        options: &ModelOptions,
        system_prompt: Option<&SystemPrompt>,
    ) -> Map<String, Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sp) = system_prompt.filter(|p| !p.is_blank()) {
            messages.push(chat_format::message("system", &sp.text));
        }
        messages.push(chat_format::message("user", prompt));

        let mut body = chat_format::request_body(model_id, messages);
        let consumed: Vec<&str> = PARAMS
            .iter()
            .map(|(ours, _)| *ours)
            .chain(["maxTokens"])
            .collect();
        pass_through(options, &consumed, &mut body);

        for (ours, theirs) in PARAMS {
            if let Some(v) = options.get(ours) {
                body.insert((*theirs).into(), v.clone());
            }
        }
        if let Some(max) = token_count(options, "maxTokens") {
            body.insert("max_tokens".into(), max);
        }
        body
    }

    async fn fetch_models(
        &self,
        client: &VendorClient,
    ) -> std::result::Result<Vec<AvailableModel>, VendorError> {
        let list: ModelList<OpenRouterModel> = client.get_json("models").await?;
        Ok(list.data.into_iter().map(AvailableModel::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct OpenRouterModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<OpenRouterPricing>,
    #[serde(default)]
    top_provider: Option<TopProvider>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterPricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopProvider {
    #[serde(default)]
    max_completion_tokens: Option<u64>,
}

impl From<OpenRouterModel> for AvailableModel {
    fn from(m: OpenRouterModel) -> Self {
        let pricing = m.pricing.map(|p| ModelPricing {
            prompt: p.prompt.unwrap_or_default(),
            completion: p.completion.unwrap_or_default(),
        });
        Self {
            display_name: m.name,
            description: m.description,
            context_window: m.context_length,
            max_output_tokens: m.top_provider.and_then(|t| t.max_completion_tokens),
            pricing,
            ..AvailableModel::new(m.id)
        }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn provider_id(&self) -> &str {
        INFO.id
    }

    async fn generate(
        &self,
        prompt: &str,
        model_id: &str,
        options: &ModelOptions,
        system_prompt: Option<&SystemPrompt>,
    ) -> Result<LlmResponse> {
        let client = self.client.get().await?;
        let body = Self::build_request(model_id, prompt, options, system_prompt);

        debug!(provider = INFO.id, model = %model_id, "sending chat completion request");

        let completion: ChatCompletion = client
            .post_json("chat/completions", &body)
            .await
            .map_err(|e| classify_error(&INFO, model_id, e))?;
        Ok(completion.into_response(INFO.id, model_id))
    }

    async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
        let result = match api_key {
            Some(key) => self.fetch_models(&self.client.one_off(key)?).await,
            None => self.fetch_models(self.client.get().await?).await,
        };
        result.map_err(|e| classify_listing_error(&INFO, e))
    }
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_all_sampling_params() {
        let options = ModelOptions::new()
            .with("temperature", 0.6)
            .with("topP", 0.9)
            .with("topK", 20)
            .with("maxTokens", 300)
            .with("frequencyPenalty", 0.1)
            .with("presencePenalty", 0.2)
            .with("repetitionPenalty", 1.1)
            .with("transforms", json!(["middle-out"]));
        let system = SystemPrompt::new("sys");
        let body = OpenRouterProvider::build_request(
            "meta-llama/llama-3-70b:free",
            "hi",
            &options,
            Some(&system),
        );

        assert_eq!(body["model"], json!("meta-llama/llama-3-70b:free"));
        assert_eq!(
            body["messages"][0],
            json!({"role": "system", "content": "sys"})
        );
        assert_eq!(body["temperature"], json!(0.6));
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["top_k"], json!(20));
        assert_eq!(body["max_tokens"], json!(300));
        assert_eq!(body["frequency_penalty"], json!(0.1));
        assert_eq!(body["presence_penalty"], json!(0.2));
        assert_eq!(body["repetition_penalty"], json!(1.1));
        assert_eq!(body["transforms"], json!(["middle-out"]));
        for camel in ["topP", "topK", "maxTokens", "repetitionPenalty"] {
            assert!(!body.contains_key(camel), "{camel}");
        }
    }

    #[test]
    fn model_listing_keeps_pricing() {
        let raw: OpenRouterModel = serde_json::from_value(json!({
            "id": "openai/gpt-4o",
            "name": "OpenAI: GPT-4o",
            "context_length": 128000,
            "pricing": {"prompt": "0.0000025", "completion": "0.00001"},
            "top_provider": {"max_completion_tokens": 16384}
        }))
        .unwrap();
        let model = AvailableModel::from(raw);
        assert_eq!(model.id, "openai/gpt-4o");
        assert_eq!(model.display_name.as_deref(), Some("OpenAI: GPT-4o"));
        assert_eq!(model.context_window, Some(128000));
        assert_eq!(model.max_output_tokens, Some(16384));
        let pricing = model.pricing.unwrap();
        assert_eq!(pricing.prompt, "0.0000025");
        assert_eq!(pricing.completion, "0.00001");
    }
}
