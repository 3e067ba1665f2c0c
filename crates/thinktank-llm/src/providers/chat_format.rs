//! OpenAI chat-completions wire types, shared by OpenAI and OpenRouter.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use thinktank_types::LlmResponse;

pub(crate) fn message(role: &str, content: &str) -> Value {
    json!({ "role": role, "content": content })
}

/// Request body with `model` and `messages` set.
pub(crate) fn request_body(model_id: &str, messages: Vec<Value>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("model".into(), Value::from(model_id));
    body.insert("messages".into(), Value::Array(messages));
    body
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_empty")]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    /// A string, `null`, or (some OpenRouter upstreams) an array of parts.
    #[serde(default)]
    content: Value,
}

impl ChatCompletion {
    /// Text of the first choice, `""` when there is none.
    pub(crate) fn text(&self) -> String {
        let content = self
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| &m.content);
        match content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect(),
            _ => String::new(),
        }
    }

    pub(crate) fn into_response(self, provider: &str, model_id: &str) -> LlmResponse {
        let mut response = LlmResponse::new(provider, model_id, self.text());
        if let Some(id) = self.id {
            response.metadata.insert("id".into(), Value::String(id));
        }
        if let Some(model) = self.model {
            response
                .metadata
                .insert("model".into(), Value::String(model));
        }
        let first = self.choices.into_iter().next();
        if let Some(reason) = first.and_then(|c| c.finish_reason) {
            response
                .metadata
                .insert("finishReason".into(), Value::String(reason));
        }
        if let Some(usage) = self.usage {
            response.metadata.insert("usage".into(), usage);
        }
        response
    }
}

/// `{"data": [...]}` as returned by `GET /models`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ModelList<T> {
    #[serde(default = "Vec::new", deserialize_with = "super::null_as_empty")]
    pub data: Vec<T>,
}
