//! Anthropic Messages API.
//!
//! `max_tokens` is required by the API and defaults to [`DEFAULT_MAX_TOKENS`].
//! When extended thinking is enabled the API demands `temperature == 1`,
//! rejects `top_k`, and needs `max_tokens` above the thinking budget; the
//! request builder enforces all three.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use thinktank_types::{AvailableModel, LlmResponse, ModelOptions, Result, SystemPrompt};

use super::chat_format::ModelList;
use super::{pass_through, token_count};
use crate::http::{AuthScheme, LazyClient, VendorClient};
use crate::provider::LlmProvider;
use crate::provider_errors::{ProviderInfo, VendorError, classify_error, classify_listing_error};

pub static INFO: ProviderInfo = ProviderInfo {
    id: "anthropic",
    display_name: "Anthropic",
    api_key_env: "ANTHROPIC_API_KEY",
    console_url: "https://console.anthropic.com/settings/keys",
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

const CONSUMED: &[&str] = &["temperature", "topP", "topK", "maxTokens", "thinking"];

/// True when `options.thinking.type == "enabled"`.
pub fn thinking_enabled(options: &ModelOptions) -> bool {
    options
        .get_object("thinking")
        .and_then(|t| t.get("type"))
        .and_then(Value::as_str)
        == Some("enabled")
}

pub struct AnthropicProvider {
    client: LazyClient,
}

impl AnthropicProvider {
    /// `api_key` overrides `ANTHROPIC_API_KEY`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: LazyClient::new(
                &INFO,
                api_key,
                DEFAULT_BASE_URL,
                AuthScheme::Header("x-api-key"),
            )
            .with_header("anthropic-version", API_VERSION),
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
        let mut body = Map::new();
        body.insert("model".into(), Value::from(model_id));
        body.insert(
            "messages".into(),
            json!([{ "role": "user", "content": prompt }]),
        );
        pass_through(options, CONSUMED, &mut body);

        let mut max_tokens =
            token_count(options, "maxTokens").unwrap_or(Value::from(DEFAULT_MAX_TOKENS));

        if let Some(sp) = system_prompt.filter(|p| !p.is_blank()) {
            body.insert("system".into(), Value::from(sp.text.as_str()));
        }
        if let Some(top_p) = options.get("topP") {
            body.insert("top_p".into(), top_p.clone());
        }

        if thinking_enabled(options) {
            if let Some(thinking) = options.get("thinking") {
                body.insert("thinking".into(), thinking.clone());
            }
            if options.contains_key("temperature") || options.contains_key("topK") {
                debug!(
                    model = %model_id,
                    "thinking enabled: forcing temperature=1 and dropping top_k"
                );
            }
            body.insert("temperature".into(), json!(1));

            let budget = options
                .get_object("thinking")
                .and_then(|t| t.get("budget_tokens"))
                .and_then(Value::as_u64);
            if let (Some(budget), Some(max)) = (budget, max_tokens.as_u64())
                && max <= budget
            {
                let raised = budget.saturating_add(DEFAULT_MAX_TOKENS);
                warn!(
                    model = %model_id,
                    max_tokens = max,
                    budget_tokens = budget,
                    raised,
                    "max_tokens must exceed the thinking budget"
                );
                max_tokens = Value::from(raised);
            }
        } else {
            if let Some(t) = options.get("temperature") {
                body.insert("temperature".into(), t.clone());
            }
            if let Some(k) = options.get("topK") {
                body.insert("top_k".into(), k.clone());
            }
            if let Some(thinking) = options.get("thinking") {
                body.insert("thinking".into(), thinking.clone());
            }
        }

        body.insert("max_tokens".into(), max_tokens);
        body
    }

    async fn fetch_models(
        &self,
        client: &VendorClient,
    ) -> std::result::Result<Vec<AvailableModel>, VendorError> {
        let list: ModelList<AnthropicModel> = client.get_json("models?limit=1000").await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| AvailableModel {
                display_name: m.display_name,
                ..AvailableModel::new(m.id)
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    /// Concatenated `text` blocks; thinking and tool blocks are skipped.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }

    fn into_response(self, model_id: &str) -> LlmResponse {
        let mut response = LlmResponse::new(INFO.id, model_id, self.text());
        let meta = &mut response.metadata;
        if let Some(id) = self.id {
            meta.insert("id".into(), Value::String(id));
        }
        if let Some(model) = self.model {
            meta.insert("model".into(), Value::String(model));
        }
        if let Some(reason) = self.stop_reason {
            meta.insert("stopReason".into(), Value::String(reason));
        }
        if let Some(usage) = self.usage {
            meta.insert("usage".into(), usage);
        }
        response
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicModel {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
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

        debug!(
            provider = INFO.id,
            model = %model_id,
            thinking = thinking_enabled(options),
            "sending messages request"
        );

        let message: MessagesResponse = client
            .post_json("messages", &body)
            .await
            .map_err(|e| classify_error(&INFO, model_id, e))?;
        Ok(message.into_response(model_id))
    }

    async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
        let result = match api_key {
            Some(key) => self.fetch_models(&self.client.one_off(key)?).await,
            None => self.fetch_models(self.client.get().await?).await,
        };
        result.map_err(|e| classify_listing_error(&INFO, e))
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "claude-3-7-sonnet-20250219";

    fn thinking(budget: u64) -> Value {
        json!({"type": "enabled", "budget_tokens": budget})
    }

    #[test]
    fn defaults_max_tokens() {
        let body = AnthropicProvider::build_request(MODEL, "hi", &ModelOptions::new(), None);
        assert_eq!(body["max_tokens"], json!(4096));
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
        assert!(!body.contains_key("system"));
    }

    #[test]
    fn maps_sampling_options_and_system() {
        let options = ModelOptions::new()
            .with("temperature", 0.4)
            .with("topP", 0.8)
            .with("topK", 40)
            .with("maxTokens", 1000)
            .with("stop_sequences", json!(["END"]));
        let system = SystemPrompt::new("be kind");
        let body = AnthropicProvider::build_request(MODEL, "hi", &options, Some(&system));
        assert_eq!(body["system"], json!("be kind"));
        assert_eq!(body["temperature"], json!(0.4));
        assert_eq!(body["top_p"], json!(0.8));
        assert_eq!(body["top_k"], json!(40));
        assert_eq!(body["max_tokens"], json!(1000));
        assert_eq!(body["stop_sequences"], json!(["END"]));
        assert!(!body.contains_key("topK"));
    }

    #[test]
    fn thinking_forces_temperature_one_and_drops_top_k() {
        let options = ModelOptions::new()
            .with("temperature", 0.5)
            .with("topK", 10)
            .with("maxTokens", 16000)
            .with("thinking", thinking(8000));
        let body = AnthropicProvider::build_request(MODEL, "hi", &options, None);
        assert_eq!(body["temperature"], json!(1));
        assert!(!body.contains_key("top_k"));
        assert_eq!(body["thinking"], thinking(8000));
        assert_eq!(body["max_tokens"], json!(16000));
    }

    #[test]
    fn thinking_raises_max_tokens_above_budget() {
        let options = ModelOptions::new().with("thinking", thinking(8000));
        let body = AnthropicProvider::build_request(MODEL, "hi", &options, None);
        assert_eq!(body["max_tokens"], json!(8000 + DEFAULT_MAX_TOKENS));
    }

    #[test]
    fn huge_thinking_budget_saturates() {
        let options = ModelOptions::new().with("thinking", thinking(u64::MAX));
        let body = AnthropicProvider::build_request(MODEL, "hi", &options, None);
        assert_eq!(body["max_tokens"], json!(u64::MAX));
    }

    #[test]
    fn disabled_thinking_keeps_sampling() {
        let options = ModelOptions::new()
            .with("temperature", 0.5)
            .with("thinking", json!({"type": "disabled"}));
        assert!(!thinking_enabled(&options));
        let body = AnthropicProvider::build_request(MODEL, "hi", &options, None);
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["thinking"], json!({"type": "disabled"}));
    }

    #[test]
    fn text_joins_text_blocks_only() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "hel"},
                {"type": "text", "text": "lo"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        let response = parsed.into_response(MODEL);
        assert_eq!(response.text, "hello");
        assert_eq!(response.metadata["stopReason"], json!("end_turn"));
    }

    #[test]
    fn empty_content_is_empty_text() {
        let parsed: MessagesResponse = serde_json::from_value(json!({"content": []})).unwrap();
        assert_eq!(parsed.text(), "");
    }
}
