use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::models::{ResourceIdentity, ResourceState};
use crate::provider::ResourceProvider;

/// Finds a resource by listing its resource group.
pub struct ResourceLocator {
    provider: Arc<dyn ResourceProvider>,
}

impl ResourceLocator {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self { provider }
    }

    /// `Ok(None)` when nothing in the group matches. Read-only.
    pub async fn locate(&self, identity: &ResourceIdentity) -> Result<Option<ResourceState>> {
        let resources = self
            .provider
            .list_resource_group(identity.subscription_id(), identity.resource_group())
            .await?;
        debug!(
            resource_group = identity.resource_group(),
            count = resources.len(),
            "Listed resource group"
        );
        Ok(select(resources, identity))
    }
}

/// First entry matching the identity's name (and type, when given).
pub fn select(resources: Vec<ResourceState>, identity: &ResourceIdentity) -> Option<ResourceState> {
    resources.into_iter().find(|r| r.matches(identity))
}
