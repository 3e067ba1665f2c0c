//! Options and system-prompt resolution.
//!
//! Precedence, lowest to highest: model config, group, call site. The merge
//! is shallow: a nested object such as `thinking` set at a higher level
//! replaces the lower one whole.

use thinktank_types::{ModelOptions, SystemPrompt};

/// Merge the three option layers into the options sent to the provider.
pub fn resolve_options(
    model_options: Option<&ModelOptions>,
    group_options: Option<&ModelOptions>,
    cli_options: Option<&ModelOptions>,
) -> ModelOptions {
    let mut resolved = ModelOptions::new();
    for layer in [model_options, group_options, cli_options].into_iter().flatten() {
        resolved.merge_from(layer);
    }
    resolved
}

/// Pick the system prompt: call-site override, then model, then group.
pub fn resolve_system_prompt<'a>(
    override_prompt: Option<&'a SystemPrompt>,
    model_prompt: Option<&'a SystemPrompt>,
    group_prompt: Option<&'a SystemPrompt>,
) -> Option<&'a SystemPrompt> {
    override_prompt.or(model_prompt).or(group_prompt)
}
