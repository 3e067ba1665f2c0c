//! The [`LlmProvider`] trait every vendor adapter implements.

use async_trait::async_trait;

use thinktank_types::{
    AvailableModel, LlmResponse, ModelOptions, Result, SystemPrompt, ThinktankError,
};

/// A vendor that can generate text for a prompt.
///
/// Implementations own credential resolution, request mapping, response
/// normalization and failure classification for one vendor API. Every
/// failure they return is a classified [`ThinktankError`] scoped to
/// [`provider_id`](Self::provider_id).
///
/// # Example
///
/// ```rust,ignore
/// use thinktank_llm::LlmProvider;
/// use thinktank_types::ModelOptions;
///
/// async fn ask(provider: &dyn LlmProvider) -> thinktank_types::Result<String> {
///     let options = ModelOptions::new().with("temperature", 0.2);
///     let response = provider.generate("What is 2+2?", "gpt-4o", &options, None).await?;
///     Ok(response.text)
/// }
/// ```
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry id (`"openai"`, `"anthropic"`, ...). Never changes.
    fn provider_id(&self) -> &str;

    /// Send `prompt` to `model_id` and return the normalized response.
    ///
    /// `options` are already resolved through the cascade. Keys the vendor
    /// does not know are passed through verbatim. Empty vendor content
    /// yields `text == ""`, not an error.
    async fn generate(
        &self,
        prompt: &str,
        model_id: &str,
        options: &ModelOptions,
        system_prompt: Option<&SystemPrompt>,
    ) -> Result<LlmResponse>;

    /// Models the vendor offers for the given (or configured) key.
    ///
    /// An explicit `api_key` is used for this call only.
    async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<AvailableModel>> {
        let _ = api_key;
        Err(ThinktankError::api("listing models is not supported by this provider")
            .for_provider(self.provider_id())
            .with_suggestion("Check the vendor's documentation for the available model ids"))
    }
}
