//! Normalized provider responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::prompt::SystemPrompt;

/// The result of one successful `generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    /// Provider id that produced the response.
    pub provider: String,

    /// Model id the request was sent to.
    pub model_id: String,

    /// Plain generated text. Empty when the vendor returned no content.
    pub text: String,

    /// Raw vendor usage and identifiers, for diagnostics only.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Group the model was invoked through, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
}

impl LlmResponse {
    pub fn new(
        provider: impl Into<String>,
        model_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            text: text.into(),
            metadata: HashMap::new(),
            group_info: None,
        }
    }

    /// The `provider:modelId` reference this response answers.
    pub fn model_ref(&self) -> String {
        format!("{}:{}", self.provider, self.model_id)
    }
}

/// Group attribution attached to a response by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub name: String,
    pub system_prompt: SystemPrompt,
}

/// One entry of a provider's model catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableModel {
    /// Model id as accepted by `generate`.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input context window in tokens, when the vendor reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

impl AvailableModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Per-token prices as reported by the vendor (kept as strings; vendors
/// publish them as decimal strings and precision varies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt: String,
    pub completion: String,
}
