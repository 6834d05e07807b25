use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use super::policy::{FirstListed, VersionPolicy};
use super::ApiVersion;
use crate::provider::ResourceProvider;

/// Split a provider-qualified type on its first `/`:
/// `Microsoft.Sql/servers/databases` → (`Microsoft.Sql`, `servers/databases`).
pub fn split_resource_type(resource_type: &str) -> Option<(&str, &str)> {
    resource_type
        .split_once('/')
        .filter(|(ns, ty)| !ns.is_empty() && !ty.is_empty())
}

/// Resolves the API version to use when updating a resource type.
///
/// Lookups are cached per (subscription, resource type) for the lifetime of
/// the resolver, which is one run. Rollback uses `resolve_fresh` so it never
/// relies on a cached answer.
pub struct ApiVersionResolver {
    provider: Arc<dyn ResourceProvider>,
    policy: Arc<dyn VersionPolicy>,
    cache: DashMap<(String, String), ApiVersion>,
}

impl ApiVersionResolver {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self::with_policy(provider, Arc::new(FirstListed))
    }

    pub fn with_policy(provider: Arc<dyn ResourceProvider>, policy: Arc<dyn VersionPolicy>) -> Self {
        Self {
            provider,
            policy,
            cache: DashMap::new(),
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Resolve, using the run cache when possible. `Ok(None)` means unresolved.
    pub async fn resolve(
        &self,
        subscription_id: &str,
        resource_type: &str,
    ) -> Result<Option<ApiVersion>> {
        let key = (subscription_id.to_string(), resource_type.to_string());
        if let Some(hit) = self.cache.get(&key) {
            debug!(resource_type, api_version = %hit.value(), "API version cache hit");
            return Ok(Some(hit.value().clone()));
        }
        self.resolve_fresh(subscription_id, resource_type).await
    }

    /// Resolve from provider metadata, refreshing the cache entry.
    pub async fn resolve_fresh(
        &self,
        subscription_id: &str,
        resource_type: &str,
    ) -> Result<Option<ApiVersion>> {
        let key = (subscription_id.to_string(), resource_type.to_string());

        let Some((namespace, type_name)) = split_resource_type(resource_type) else {
            debug!(resource_type, "Resource type has no provider namespace");
            self.cache.remove(&key);
            return Ok(None);
        };

        let metadata = self.provider.get_provider(subscription_id, namespace).await?;
        let selected = metadata
            .as_ref()
            .and_then(|m| m.resource_type(type_name))
            .and_then(|rt| self.policy.select(&rt.api_versions))
            .map(|v| ApiVersion::new(namespace, type_name, v));

        match &selected {
            Some(version) => {
                debug!(
                    namespace,
                    type_name,
                    api_version = %version,
                    policy = self.policy.name(),
                    "Resolved API version"
                );
                self.cache.insert(key, version.clone());
            }
            None => {
                debug!(namespace, type_name, "No API version declared for type");
                self.cache.remove(&key);
            }
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_separator_only() {
        assert_eq!(
            split_resource_type("Microsoft.Sql/servers/databases"),
            Some(("Microsoft.Sql", "servers/databases"))
        );
        assert_eq!(
            split_resource_type("Microsoft.Web/sites"),
            Some(("Microsoft.Web", "sites"))
        );
        assert_eq!(split_resource_type("nonamespace"), None);
        assert_eq!(split_resource_type("/sites"), None);
        assert_eq!(split_resource_type("Microsoft.Web/"), None);
    }
}
