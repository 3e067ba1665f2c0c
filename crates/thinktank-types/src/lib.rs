//! # thinktank-types
//!
//! Core type definitions for thinktank, the multi-provider LLM dispatcher.
//!
//! This crate sits at the bottom of the dependency graph. It contains:
//!
//! - **[`error`]** -- the [`ThinktankError`] taxonomy
//! - **[`config`]** -- [`AppConfig`], [`ModelConfig`], [`ModelGroup`] and lookups
//! - **[`options`]** -- the open [`ModelOptions`] bag
//! - **[`prompt`]** -- [`SystemPrompt`]
//! - **[`response`]** -- [`LlmResponse`] and [`AvailableModel`]
//! - **[`secret`]** -- the [`ApiKey`] wrapper

pub mod config;
pub mod error;
pub mod options;
pub mod prompt;
pub mod response;
pub mod secret;

pub use config::{AppConfig, ModelConfig, ModelGroup, parse_model_ref};
pub use error::{BoxError, ErrorCategory, ErrorKind, Result, ThinktankError};
pub use options::ModelOptions;
pub use prompt::SystemPrompt;
pub use response::{AvailableModel, GroupInfo, LlmResponse, ModelPricing};
pub use secret::ApiKey;
