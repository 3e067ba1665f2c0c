//! CLI command implementations for `thinktank`.
//!
//! - [`run`] -- send one prompt to many models concurrently.
//! - [`models`] -- list the models each provider offers.
//! - [`config_cmd`] -- show the resolved configuration.

pub mod config_cmd;
pub mod models;
pub mod run;

use std::path::Path;

use thinktank_llm::ProviderRegistry;
use thinktank_types::AppConfig;

use crate::{config_loader, credentials};

/// Load configuration from the given path override or via auto-discovery.
pub fn load_config(config_override: Option<&str>) -> anyhow::Result<AppConfig> {
    Ok(config_loader::load_config(config_override.map(Path::new))?)
}

/// The registry every command dispatches through: the built-in providers,
/// with keys from any model-level `apiKeyEnvVar`.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    ProviderRegistry::with_defaults(&credentials::provider_keys(config))
}
