//! System prompts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Instructions sent ahead of the user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    /// The prompt text.
    pub text: String,

    /// Free-form metadata; never sent to the vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    /// True when the text is empty or whitespace. Providers skip blank
    /// prompts rather than sending an empty system role.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl From<&str> for SystemPrompt {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SystemPrompt {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
