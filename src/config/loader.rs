use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::types::TagsyncConfig;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "tagsync.yaml";

/// Load configuration from `path`.
///
/// - A missing default `tagsync.yaml` yields the built-in defaults.
/// - A missing file that was named explicitly is an error.
pub fn load_config(path: &str) -> Result<TagsyncConfig> {
    let p = Path::new(path);

    if p.is_file() {
        let content = fs::read_to_string(p)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        return parse_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path));
    }

    if path == DEFAULT_CONFIG_FILE && !p.exists() {
        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        return Ok(TagsyncConfig::default());
    }

    bail!(
        "Config not found: '{}'. Create it or omit -c to use the defaults",
        path
    )
}

/// Parse YAML config content. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<TagsyncConfig> {
    if content.trim().is_empty() {
        return Ok(TagsyncConfig::default());
    }
    let config: TagsyncConfig = serde_yaml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &TagsyncConfig) -> Result<()> {
    let settings = &config.settings;
    if settings.endpoint.trim().is_empty() {
        bail!("settings.endpoint must not be empty");
    }
    if settings.poll_interval_ms == 0 {
        bail!("settings.poll_interval_ms must be greater than zero");
    }
    settings
        .api_version_policy
        .parse::<crate::resolver::policy::PolicyName>()?;
    Ok(())
}
