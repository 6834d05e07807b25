use std::str::FromStr;

use anyhow::bail;

/// Chooses one API version from a provider's declared list.
///
/// Providers return versions newest first; policies must not re-sort.
pub trait VersionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn select<'a>(&self, versions: &'a [String]) -> Option<&'a str>;
}

/// Take the first version the provider lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstListed;

impl VersionPolicy for FirstListed {
    fn name(&self) -> &'static str {
        "first-listed"
    }

    fn select<'a>(&self, versions: &'a [String]) -> Option<&'a str> {
        versions.first().map(String::as_str)
    }
}

/// Take the first non-preview version, falling back to the first listed one
/// when the provider only publishes previews.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableFirst;

impl VersionPolicy for StableFirst {
    fn name(&self) -> &'static str {
        "stable-first"
    }

    fn select<'a>(&self, versions: &'a [String]) -> Option<&'a str> {
        versions
            .iter()
            .find(|v| !v.to_ascii_lowercase().contains("preview"))
            .or_else(|| versions.first())
            .map(String::as_str)
    }
}

/// Policy names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyName {
    #[default]
    FirstListed,
    StableFirst,
}

impl PolicyName {
    pub fn build(self) -> std::sync::Arc<dyn VersionPolicy> {
        match self {
            PolicyName::FirstListed => std::sync::Arc::new(FirstListed),
            PolicyName::StableFirst => std::sync::Arc::new(StableFirst),
        }
    }
}

impl FromStr for PolicyName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first-listed" => Ok(PolicyName::FirstListed),
            "stable-first" => Ok(PolicyName::StableFirst),
            other => bail!(
                "Unknown API version policy '{}'. Expected 'first-listed' or 'stable-first'",
                other
            ),
        }
    }
}
