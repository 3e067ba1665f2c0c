//! `thinktank config` -- inspect the resolved configuration.
//!
//! # Examples
//!
//! ```text
//! thinktank config show
//! thinktank config show --config ./thinktank.json
//! thinktank config path
//! ```

use std::path::Path;

use thinktank_types::AppConfig;

use crate::config_loader::{ConfigSource, discover_config_path};

/// Print the resolved configuration as formatted JSON.
pub fn config_show(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", render_config(config)?);
    Ok(())
}

/// Print which config file would be loaded and why.
pub fn config_path(config_override: Option<&str>) {
    println!("{}", describe_path(config_override.map(Path::new)));
}

pub fn render_config(config: &AppConfig) -> serde_json::Result<String> {
    serde_json::to_string_pretty(config)
}

pub fn describe_path(explicit: Option<&Path>) -> String {
    match discover_config_path(explicit) {
        Some((path, source)) => {
            let origin = match source {
                ConfigSource::Flag => "--config",
                ConfigSource::EnvVar => crate::config_loader::CONFIG_ENV_VAR,
                ConfigSource::Discovered => "default location",
            };
            format!("{} (from {origin})", path.display())
        }
        None => "no config file found; using an empty configuration".into(),
    }
}
