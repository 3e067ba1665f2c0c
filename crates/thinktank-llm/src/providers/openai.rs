//! OpenAI chat completions.
//!
//! Option mapping: `temperature`, `topP` → `top_p`, `maxTokens` →
//! `max_tokens`, `frequencyPenalty` → `frequency_penalty`,
//! `presencePenalty` → `presence_penalty`. Other keys pass through.
//!
//! Reasoning models (`o1*`, `o3*`, `o4*`) reject sampling parameters and
//! take `max_completion_tokens`, and they get the system prompt as a
//! `developer` message. `o1-mini` and `o1-preview` accept neither a system
//! nor a developer message, so the system text is prepended to the prompt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use thinktank_types::{AvailableModel, LlmResponse, ModelOptions, Result, SystemPrompt};

use super::chat_format::{self, ChatCompletion, ModelList};
use super::{pass_through, prepend_system, token_count};
use crate::http::{AuthScheme, LazyClient, VendorClient};
use crate::provider::LlmProvider;
use crate::provider_errors::{ProviderInfo, VendorError, classify_error, classify_listing_error};

pub static INFO: ProviderInfo = ProviderInfo {
    id: "openai",
    display_name: "OpenAI",
    api_key_env: "OPENAI_API_KEY",
    console_url: "https://platform.openai.com/api-keys",
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CONSUMED: &[&str] = &[
    "temperature",
    "topP",
    "maxTokens",
    "frequencyPenalty",
    "presencePenalty",
];

/// Ids that use the reasoning-model request shape.
pub fn is_reasoning_model(model_id: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|p| model_id.starts_with(p))
}

/// Reasoning models with no system or developer role.
fn lacks_system_role(model_id: &str) -> bool {
    model_id.starts_with("o1-mini") || model_id.starts_with("o1-preview")
}

pub struct OpenAiProvider {
    client: LazyClient,
}

impl OpenAiProvider {
    /// `api_key` overrides `OPENAI_API_KEY`. Nothing is read or built until
    /// the first call.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: LazyClient::new(&INFO, api_key, DEFAULT_BASE_URL, AuthScheme::Bearer),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    /// The JSON body sent for one `generate` call.
    pub fn build_request(
        model_id: &str,
        prompt: &str,
        options: &ModelOptions,
        system_prompt: Option<&SystemPrompt>,
    ) -> Map<String, Value> {
        let reasoning = is_reasoning_model(model_id);
        let system = system_prompt.filter(|p| !p.is_blank());

        let mut messages = Vec::with_capacity(2);
        let user_text = match system {
            Some(sp) if reasoning && lacks_system_role(model_id) => {
                prepend_system(&sp.text, prompt)
            }
            Some(sp) => {
                let role = if reasoning { "developer" } else { "system" };
                messages.push(chat_format::message(role, &sp.text));
                prompt.to_string()
            }
            None => prompt.to_string(),
        };
        messages.push(chat_format::message("user", &user_text));

        let mut body = chat_format::request_body(model_id, messages);
        pass_through(options, CONSUMED, &mut body);

        if let Some(max) = token_count(options, "maxTokens") {
            let key = if reasoning { "max_completion_tokens" } else { "max_tokens" };
            body.insert(key.into(), max);
        }
        if !reasoning {
            for (ours, theirs) in [("temperature", "temperature"), ("topP", "top_p")] {
                if let Some(v) = options.get(ours) {
                    body.insert(theirs.into(), v.clone());
                }
            }
        }
        for (ours, theirs) in [
            ("frequencyPenalty", "frequency_penalty"),
            ("presencePenalty", "presence_penalty"),
        ] {
            if let Some(v) = options.get(ours) {
                body.insert(theirs.into(), v.clone());
            }
        }
        body
    }

    async fn fetch_models(
        &self,
        client: &VendorClient,
    ) -> std::result::Result<Vec<AvailableModel>, VendorError> {
        let list: ModelList<OpenAiModel> = client.get_json("models").await?;
        Ok(list.data.into_iter().map(AvailableModel::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

impl From<OpenAiModel> for AvailableModel {
    fn from(m: OpenAiModel) -> Self {
        Self {
            description: m.owned_by.map(|o| format!("owned by {o}")),
            ..AvailableModel::new(m.id)
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
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
            reasoning = is_reasoning_model(model_id),
            "sending chat completion request"
        );

        let completion: ChatCompletion = client
            .post_json("chat/completions", &body)
            .await
            .map_err(|e| classify_error(&INFO, model_id, e))?;
        let response = completion.into_response(INFO.id, model_id);

        debug!(
            provider = INFO.id,
            model = %model_id,
            chars = response.text.len(),
            "chat completion received"
        );
        Ok(response)
    }

    async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
        let result = match api_key {
            Some(key) => self.fetch_models(&self.client.one_off(key)?).await,
            None => self.fetch_models(self.client.get().await?).await,
        };
        result.map_err(|e| classify_listing_error(&INFO, e))
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> ModelOptions {
        ModelOptions::new()
            .with("temperature", 0.7)
            .with("topP", 0.9)
            .with("maxTokens", 500)
            .with("frequencyPenalty", 0.1)
            .with("presencePenalty", 0.2)
            .with("seed", 42)
    }

    #[test]
    fn reasoning_model_detection() {
        for id in ["o1", "o1-mini", "o3-mini", "o4-mini"] {
            assert!(is_reasoning_model(id), "{id}");
        }
        for id in ["gpt-4o", "gpt-4.1", "chatgpt-4o-latest"] {
            assert!(!is_reasoning_model(id), "{id}");
        }
    }

    #[test]
    fn standard_model_mapping() {
        let system = SystemPrompt::new("be terse");
        let body = OpenAiProvider::build_request("gpt-4o", "hi", &opts(), Some(&system));
        assert_eq!(body["model"], json!("gpt-4o"));
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ])
        );
        assert_eq!(body["temperature"], json!(0.7));
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["max_tokens"], json!(500));
        assert_eq!(body["frequency_penalty"], json!(0.1));
        assert_eq!(body["presence_penalty"], json!(0.2));
        assert_eq!(body["seed"], json!(42));
        assert!(!body.contains_key("maxTokens"));
        assert!(!body.contains_key("topP"));
    }

    #[test]
    fn reasoning_model_mapping() {
        let system = SystemPrompt::new("be terse");
        let body = OpenAiProvider::build_request("o3-mini", "hi", &opts(), Some(&system));
        assert!(!body.contains_key("temperature"));
        assert!(!body.contains_key("top_p"));
        assert!(!body.contains_key("max_tokens"));
        assert_eq!(body["max_completion_tokens"], json!(500));
        assert_eq!(
            body["messages"][0],
            json!({"role": "developer", "content": "be terse"})
        );
    }

    #[test]
    fn o1_mini_prepends_system_text() {
        let system = SystemPrompt::new("be terse");
        let body =
            OpenAiProvider::build_request("o1-mini", "hi", &ModelOptions::new(), Some(&system));
        assert_eq!(
            body["messages"],
            json!([{"role": "user", "content": "be terse\n\nhi"}])
        );
    }

    #[test]
    fn blank_system_prompt_is_skipped() {
        let system = SystemPrompt::new("   ");
        let body =
            OpenAiProvider::build_request("gpt-4o", "hi", &ModelOptions::new(), Some(&system));
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn debug_hides_api_key() {
        let provider = OpenAiProvider::new(Some("sk-secret-value".into()));
        assert!(!format!("{provider:?}").contains("sk-secret-value"));
    }
}
