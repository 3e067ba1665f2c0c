//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. The `--config` path, if given.
//! 2. `THINKTANK_CONFIG` environment variable.
//! 3. `<config dir>/thinktank/config.json` (e.g. `~/.config/thinktank` on Linux).
//! 4. `~/.thinktank/config.json`
//! 5. If none exists, an empty [`AppConfig`].
//!
//! Paths named explicitly (1 and 2) must exist. The well-known locations are
//! only used when present.

use std::path::{Path, PathBuf};

use tracing::debug;

use thinktank_types::{AppConfig, Result, ThinktankError};

pub const CONFIG_ENV_VAR: &str = "THINKTANK_CONFIG";

/// Where a config path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Flag,
    EnvVar,
    Discovered,
}

/// Resolve the config path to use, without reading it.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), ConfigSource::Flag));
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some((PathBuf::from(path), ConfigSource::EnvVar));
    }

    let candidates = [
        dirs::config_dir().map(|d| d.join("thinktank").join("config.json")),
        dirs::home_dir().map(|h| h.join(".thinktank").join("config.json")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
        .map(|p| (p, ConfigSource::Discovered))
}

/// Load the configuration, or an empty one when no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match discover_config_path(explicit) {
        Some((path, source)) => {
            debug!(path = %path.display(), ?source, "loading config");
            load_config_file(&path)
        }
        None => {
            debug!("no config file found, using empty config");
            Ok(AppConfig::default())
        }
    }
}

/// Read and parse one config file.
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    parse_config(&contents).map_err(|e| {
        let (line, column) = (e.line(), e.column());
        ThinktankError::config(format!("failed to parse config file {}: {e}", path.display()))
            .with_cause(e)
            .with_suggestion(format!("Fix the JSON near line {line}, column {column}"))
            .with_suggestion("Keys are camelCase: models[].modelId, groups.<name>.systemPrompt")
    })
}

fn parse_config(contents: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str::<AppConfig>(contents).map(AppConfig::normalized)
}

fn read_error(path: &Path, err: std::io::Error) -> ThinktankError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ThinktankError::file_system(format!(
            "config file not found: {}",
            path.display()
        ))
        .with_file_path(path)
        .with_cause(err)
        .with_suggestion("Check the path passed with --config or set in THINKTANK_CONFIG")
        .with_suggestion("Omit --config to use the default locations"),
        std::io::ErrorKind::PermissionDenied => ThinktankError::permission(format!(
            "permission denied reading config file {}",
            path.display()
        ))
        .with_cause(err)
        .with_suggestion("Check the file's permissions and owner"),
        _ => ThinktankError::file_system(format!(
            "failed to read config file {}: {err}",
            path.display()
        ))
        .with_file_path(path)
        .with_cause(err),
    }
}
