//! Google Gemini `generateContent`.
//!
//! All options land in `generationConfig`: `maxTokens` becomes
//! `maxOutputTokens`, and other keys (`temperature`, `topP`, `topK`,
//! `stopSequences`, ...) are copied as given. Gemma models have no system
//! instruction, so for them the system text is prepended to the prompt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use thinktank_types::{AvailableModel, LlmResponse, ModelOptions, Result, SystemPrompt};

use super::prepend_system;
use super::token_count;
use crate::http::{AuthScheme, LazyClient, VendorClient};
use crate::provider::LlmProvider;
use crate::provider_errors::{
    ProviderInfo, VendorError, classify_error, classify_listing_error, content_policy_error,
};

pub static INFO: ProviderInfo = ProviderInfo {
    id: "google",
    display_name: "Google Gemini",
    api_key_env: "GEMINI_API_KEY",
    console_url: "https://aistudio.google.com/app/apikey",
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `models/gemini-2.0-flash` → `gemini-2.0-flash`.
fn bare_model_id(model_id: &str) -> &str {
    model_id.strip_prefix("models/").unwrap_or(model_id)
}

fn supports_system_instruction(model_id: &str) -> bool {
    !bare_model_id(model_id).starts_with("gemma")
}

pub struct GoogleProvider {
    client: LazyClient,
}

impl GoogleProvider {
    /// `api_key` overrides `GEMINI_API_KEY`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: LazyClient::new(
                &INFO,
                api_key,
                DEFAULT_BASE_URL,
                AuthScheme::Header("x-goog-api-key"),
            ),
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
        let system = system_prompt.filter(|p| !p.is_blank());
        let user_text = match system {
            Some(sp) if !supports_system_instruction(model_id) => prepend_system(&sp.text, prompt),
            _ => prompt.to_string(),
        };

        let mut body = Map::new();
        body.insert(
            "contents".into(),
            json!([{ "role": "user", "parts": [{ "text": user_text }] }]),
        );
        if let Some(sp) = system.filter(|_| supports_system_instruction(model_id)) {
            body.insert(
                "systemInstruction".into(),
                json!({ "parts": [{ "text": sp.text }] }),
            );
        }

        let mut config = Map::new();
        for (key, value) in options.iter() {
            if key == "maxTokens" {
                continue;
            }
            config.insert(key.clone(), value.clone());
        }
        if let Some(max) = token_count(options, "maxTokens") {
            config.insert("maxOutputTokens".into(), max);
        }
        if !config.is_empty() {
            body.insert("generationConfig".into(), Value::Object(config));
        }
        body
    }

    async fn fetch_models(
        &self,
        client: &VendorClient,
    ) -> std::result::Result<Vec<AvailableModel>, VendorError> {
        let list: GeminiModelList = client.get_json("models?pageSize=1000").await?;
        Ok(list
            .models
            .into_iter()
            .filter(|m| {
                let methods = &m.supported_generation_methods;
                methods.is_empty() || methods.iter().any(|s| s == "generateContent")
            })
            .map(|m| AvailableModel {
                display_name: m.display_name,
                description: m.description,
                context_window: m.input_token_limit,
                max_output_tokens: m.output_token_limit,
                ..AvailableModel::new(bare_model_id(&m.name))
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<Value>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }

    /// Set when the prompt itself was refused and no candidate produced.
    fn block_reason(&self) -> Option<&str> {
        if !self.candidates.is_empty() {
            return None;
        }
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }

    fn into_response(self, model_id: &str) -> LlmResponse {
        let mut response = LlmResponse::new(INFO.id, model_id, self.text());
        let meta = &mut response.metadata;
        let first = self.candidates.into_iter().next();
        if let Some(reason) = first.and_then(|c| c.finish_reason) {
            meta.insert("finishReason".into(), Value::String(reason));
        }
        if let Some(usage) = self.usage_metadata {
            meta.insert("usage".into(), usage);
        }
        if let Some(version) = self.model_version {
            meta.insert("modelVersion".into(), Value::String(version));
        }
        response
    }
}

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default, deserialize_with = "super::null_as_empty")]
    models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u64>,
    #[serde(default)]
    output_token_limit: Option<u64>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    supported_generation_methods: Vec<String>,
}

#[async_trait]
impl LlmProvider for GoogleProvider {
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
        let path = format!("models/{}:generateContent", bare_model_id(model_id));

        debug!(provider = INFO.id, model = %model_id, "sending generateContent request");

        let reply: GenerateContentResponse = client
            .post_json(&path, &body)
            .await
            .map_err(|e| classify_error(&INFO, model_id, e))?;

        if let Some(reason) = reply.block_reason() {
            warn!(provider = INFO.id, model = %model_id, reason, "prompt blocked");
            let cause = VendorError::Decode(format!("prompt blocked: {reason}"));
            return Err(content_policy_error(&INFO, Some(Box::new(cause))));
        }
        Ok(reply.into_response(model_id))
    }

    async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
        let result = match api_key {
            Some(key) => self.fetch_models(&self.client.one_off(key)?).await,
            None => self.fetch_models(self.client.get().await?).await,
        };
        result.map_err(|e| classify_listing_error(&INFO, e))
    }
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_options_into_generation_config() {
        let options = ModelOptions::new()
            .with("temperature", 0.3)
            .with("maxTokens", 256)
            .with("topP", 0.95)
            .with("topK", 32)
            .with("candidateCount", 1);
        let body = GoogleProvider::build_request("gemini-2.0-flash", "hi", &options, None);
        assert_eq!(
            body["generationConfig"],
            json!({
                "temperature": 0.3,
                "maxOutputTokens": 256,
                "topP": 0.95,
                "topK": 32,
                "candidateCount": 1
            })
        );
        assert!(!body.contains_key("systemInstruction"));
    }

    #[test]
    fn no_options_no_generation_config() {
        let body =
            GoogleProvider::build_request("gemini-2.0-flash", "hi", &ModelOptions::new(), None);
        assert!(!body.contains_key("generationConfig"));
        assert_eq!(
            body["contents"],
            json!([{"role": "user", "parts": [{"text": "hi"}]}])
        );
    }

    #[test]
    fn system_instruction_for_gemini() {
        let system = SystemPrompt::new("answer in French");
        let body = GoogleProvider::build_request(
            "gemini-1.5-pro",
            "hi",
            &ModelOptions::new(),
            Some(&system),
        );
        assert_eq!(
            body["systemInstruction"],
            json!({"parts": [{"text": "answer in French"}]})
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!("hi"));
    }

    #[test]
    fn gemma_prepends_system_text() {
        let system = SystemPrompt::new("answer in French");
        let body = GoogleProvider::build_request(
            "gemma-3-27b-it",
            "hi",
            &ModelOptions::new(),
            Some(&system),
        );
        assert!(!body.contains_key("systemInstruction"));
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            json!("answer in French\n\nhi")
        );
    }

    #[test]
    fn strips_models_prefix() {
        assert_eq!(bare_model_id("models/gemini-2.0-flash"), "gemini-2.0-flash");
        assert_eq!(bare_model_id("gemini-2.0-flash"), "gemini-2.0-flash");
    }

    #[test]
    fn text_concatenates_parts() {
        let reply: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hel"}, {"text": "lo"}]},
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-2.0-flash-001"
        }))
        .unwrap();
        assert!(reply.block_reason().is_none());
        let response = reply.into_response("gemini-2.0-flash");
        assert_eq!(response.text, "hello");
        assert_eq!(response.metadata["finishReason"], json!("STOP"));
    }

    #[test]
    fn missing_candidates_is_empty_text() {
        let reply: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(reply.text(), "");
        assert!(reply.block_reason().is_none());

        let reply: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "MAX_TOKENS"}]}))
                .unwrap();
        assert_eq!(reply.text(), "");
    }

    #[test]
    fn blocked_prompt_detected() {
        let reply: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(reply.block_reason(), Some("SAFETY"));
    }
}
