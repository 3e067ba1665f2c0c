//! Provider layer for thinktank.
//!
//! One prompt goes to many LLM vendors through a common interface.
//!
//! # Architecture
//!
//! - [`LlmProvider`] trait: `generate` and `list_models` for one vendor
//! - [`providers`]: OpenAI, Anthropic, Google Gemini and OpenRouter adapters
//! - [`ProviderRegistry`]: provider ids mapped to implementations, plus
//!   [`call_provider`](ProviderRegistry::call_provider) which merges options
//!   before dispatch
//! - [`cascade`]: model < group < call-site option precedence
//! - [`provider_errors`] and [`patterns`]: turning vendor failures into
//!   actionable [`ThinktankError`](thinktank_types::ThinktankError)s
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use thinktank_llm::{CallContext, ProviderKeys, ProviderRegistry};
//!
//! let registry = ProviderRegistry::with_defaults(&ProviderKeys::default());
//! let response = registry
//!     .call_provider("openai", "gpt-4o", "What is Rust?", CallContext::default())
//!     .await?;
//! println!("{}", response.text);
//! ```

pub mod cascade;
pub mod http;
pub mod patterns;
pub mod provider;
pub mod provider_errors;
pub mod providers;
pub mod registry;

pub use cascade::{resolve_options, resolve_system_prompt};
pub use provider::LlmProvider;
pub use provider_errors::{
    ProviderInfo, VendorError, classify_error, classify_listing_error, is_retryable,
};
pub use providers::{
    AnthropicProvider, GoogleProvider, OpenAiProvider, OpenRouterProvider, ProviderKeys,
};
pub use registry::{CallContext, ProviderRegistry, RegistryError};
