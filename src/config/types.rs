use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::arm::{DEFAULT_ENDPOINT, DEFAULT_METADATA_API_VERSION};

// ─── Top-Level Config ───────────────────────────────────────────────────────

/// Root of `tagsync.yaml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsyncConfig {
    #[serde(default)]
    pub settings: Settings,
}

/// Global settings controlling how the engine talks to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resource manager base URL.
    pub endpoint: String,
    /// Fixed tick between operation status polls.
    pub poll_interval_ms: u64,
    /// Directory for the daily audit log. `None` means `$HOME/ResourceTagLogs`.
    pub log_dir: Option<PathBuf>,
    /// API version for resource-group listing and provider metadata.
    pub metadata_api_version: String,
    /// `azure-cli`, `env:<VAR>` or `static:<token>`.
    pub token: String,
    /// `first-listed` or `stable-first`.
    pub api_version_policy: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_ms: 1000,
            log_dir: None,
            metadata_api_version: DEFAULT_METADATA_API_VERSION.to_string(),
            token: "azure-cli".to_string(),
            api_version_policy: "first-listed".to_string(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The configured log directory, or `ResourceTagLogs` under the home
    /// directory.
    pub fn resolved_log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => dir.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ResourceTagLogs"),
        }
    }
}
