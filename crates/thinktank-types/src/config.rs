//! Configuration data model: models, groups, and lookups over them.
//!
//! Loading the file from disk is the CLI's job; this module only defines the
//! shape and the read-only helpers the dispatch core needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThinktankError};
use crate::options::ModelOptions;
use crate::prompt::SystemPrompt;

fn default_enabled() -> bool {
    true
}

/// One configured model, identified by `(provider, model_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Env var holding the key for this model, overriding the provider's
    /// default variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<SystemPrompt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ModelOptions>,
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            enabled: true,
            api_key_env_var: None,
            system_prompt: None,
            options: None,
        }
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<SystemPrompt>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// `provider:modelId`.
    pub fn model_ref(&self) -> String {
        format!("{}:{}", self.provider, self.model_id)
    }

    pub fn is_same_model(&self, other: &ModelConfig) -> bool {
        self.provider == other.provider && self.model_id == other.model_id
    }
}

/// A named collection of models sharing a system prompt and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGroup {
    /// Filled from the map key by [`AppConfig::normalized`] when omitted.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub system_prompt: SystemPrompt,

    #[serde(default)]
    pub models: Vec<ModelConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ModelOptions>,
}

impl ModelGroup {
    pub fn contains(&self, model: &ModelConfig) -> bool {
        self.models.iter().any(|m| m.is_same_model(model))
    }

    pub fn enabled_models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter().filter(|m| m.enabled)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Groups keyed by name. A `BTreeMap` so iteration order never depends
    /// on how the file happened to be written.
    #[serde(default)]
    pub groups: BTreeMap<String, ModelGroup>,
}

impl AppConfig {
    /// Give every group without a `name` the key it is stored under.
    pub fn normalized(mut self) -> Self {
        for (key, group) in &mut self.groups {
            if group.name.trim().is_empty() {
                group.name = key.clone();
            }
        }
        self
    }

    /// Find a model by provider and id, looking at top-level models first and
    /// then inside groups.
    pub fn find_model(&self, provider: &str, model_id: &str) -> Option<&ModelConfig> {
        let matches = |m: &&ModelConfig| m.provider == provider && m.model_id == model_id;
        self.models
            .iter()
            .find(matches)
            .or_else(|| self.groups.values().flat_map(|g| &g.models).find(matches))
    }

    pub fn enabled_models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter().filter(|m| m.enabled)
    }

    pub fn group(&self, name: &str) -> Option<&ModelGroup> {
        self.groups.get(name)
    }

    /// Resolve which group `model` should be invoked through.
    ///
    /// With `explicit` set, that group must exist and contain the model.
    /// Without it, a model in exactly one group resolves to that group, a
    /// model in none resolves to `None`, and a model in several is an error:
    /// there is no implicit tie-break.
    pub fn find_model_group(
        &self,
        model: &ModelConfig,
        explicit: Option<&str>,
    ) -> Result<Option<&ModelGroup>> {
        if let Some(name) = explicit {
            let group = self.groups.get(name).ok_or_else(|| {
                ThinktankError::config(format!("group '{name}' is not defined"))
                    .with_suggestion("Check the name against the `groups` section of your config")
                    .with_examples(self.groups.keys().cloned())
            })?;
            if !group.contains(model) {
                return Err(ThinktankError::config(format!(
                    "model '{}' is not a member of group '{name}'",
                    model.model_ref()
                ))
                .with_suggestion(format!(
                    "Add {} to the models of group '{name}', or pick a group that contains it",
                    model.model_ref()
                )));
            }
            return Ok(Some(group));
        }

        let mut containing = self.groups.values().filter(|g| g.contains(model));
        let first = containing.next();
        let rest: Vec<&str> = containing.map(|g| g.name.as_str()).collect();

        match first {
            Some(group) if rest.is_empty() => Ok(Some(group)),
            Some(group) => {
                let mut names = vec![group.name.as_str()];
                names.extend(rest);
                Err(ThinktankError::config(format!(
                    "model '{}' belongs to multiple groups: {}",
                    model.model_ref(),
                    names.join(", ")
                ))
                .with_suggestion("Name the group to use explicitly (e.g. `--group <name>`)")
                .with_examples(names.iter().map(|n| format!("--group {n}"))))
            }
            None => Ok(None),
        }
    }
}

/// Split a `provider:modelId` reference.
///
/// Only the first `:` separates, so model ids may contain colons
/// (`openrouter:meta-llama/llama-3:free`).
pub fn parse_model_ref(reference: &str) -> Result<(String, String)> {
    match reference.split_once(':') {
        Some((provider, model_id)) if !provider.is_empty() && !model_id.is_empty() => {
            Ok((provider.to_string(), model_id.to_string()))
        }
        _ => Err(ThinktankError::validation(format!(
            "invalid model reference '{reference}': expected 'provider:modelId'"
        ))
        .with_suggestion("Use the provider id and model id separated by a colon")
        .with_examples(["openai:gpt-4o", "anthropic:claude-3-7-sonnet-20250219"])),
    }
}
