use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// Resource (audience) for Azure Resource Manager tokens.
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Supplies bearer tokens for provider calls. How the credential is
/// obtained is up to the implementation.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for EnvToken {
    async fn token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => bail!("Environment variable {} is not set or empty", self.var),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliAccessToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Asks the Azure CLI (`az account get-access-token`) for a token and
/// reuses it until shortly before it expires.
pub struct AzureCliToken {
    resource: String,
    cached: Mutex<Option<(String, i64)>>,
}

impl Default for AzureCliToken {
    fn default() -> Self {
        Self {
            resource: ARM_RESOURCE.to_string(),
            cached: Mutex::new(None),
        }
    }
}

impl AzureCliToken {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenSource for AzureCliToken {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some((token, expires_on)) = cached.as_ref() {
            if *expires_on - 300 > now {
                return Ok(token.clone());
            }
        }

        debug!(resource = %self.resource, "Requesting access token from Azure CLI");
        let output = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--output",
                "json",
            ])
            .output()
            .await
            .context("Failed to run 'az'. Is the Azure CLI installed and on PATH?")?;

        if !output.status.success() {
            bail!(
                "Authentication failed. Run 'az login' and retry: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let parsed: CliAccessToken = serde_json::from_slice(&output.stdout)
            .context("Failed to parse 'az account get-access-token' output")?;

        if let Some(expires_on) = parsed.expires_on {
            *cached = Some((parsed.access_token.clone(), expires_on));
        }
        Ok(parsed.access_token)
    }
}

/// Build a token source from a setting string:
/// `azure-cli`, `env:<VAR>` or `static:<token>`.
pub fn token_source_from_setting(setting: &str) -> Result<Arc<dyn TokenSource>> {
    let setting = setting.trim();
    if setting == "azure-cli" {
        return Ok(Arc::new(AzureCliToken::new()));
    }
    if let Some(var) = setting.strip_prefix("env:") {
        if var.is_empty() {
            bail!("Token setting 'env:' needs a variable name");
        }
        return Ok(Arc::new(EnvToken::new(var)));
    }
    if let Some(token) = setting.strip_prefix("static:") {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    bail!(
        "Unknown token setting '{}'. Expected 'azure-cli', 'env:<VAR>' or 'static:<token>'",
        setting
    )
}
