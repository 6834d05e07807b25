pub mod arm;
pub mod auth;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::executor::operation::OperationStatus;
use crate::resolver::ApiVersion;
use crate::resource::models::ResourceState;
use crate::tags::TagSet;

/// Provider metadata for one namespace (e.g. `Microsoft.Storage`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub namespace: String,
    #[serde(default)]
    pub resource_types: Vec<ProviderResourceType>,
}

impl ProviderMetadata {
    /// Exact, case-sensitive lookup of a type entry.
    pub fn resource_type(&self, type_name: &str) -> Option<&ProviderResourceType> {
        self.resource_types
            .iter()
            .find(|rt| rt.resource_type == type_name)
    }
}

/// A resource type declared by a provider, with API versions in the order
/// the provider returned them (newest first).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResourceType {
    pub resource_type: String,
    #[serde(default)]
    pub api_versions: Vec<String>,
}

/// Where to look for the status of a submitted update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// The provider finished the update synchronously.
    Completed,
    /// Poll an `Azure-AsyncOperation` status resource.
    AsyncOperation(String),
    /// Poll a `Location` URL (202 while running).
    Location(String),
    /// The provider tracks the operation itself, keyed by handle id.
    Tracked,
}

/// Handle to a long-running update returned by submission.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    pub id: String,
    pub resource_id: String,
    pub api_version: ApiVersion,
    pub target: PollTarget,
    pub submitted_at: DateTime<Utc>,
}

impl OperationHandle {
    pub fn new(resource_id: &str, api_version: ApiVersion, target: PollTarget) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: resource_id.to_string(),
            api_version,
            target,
            submitted_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.target == PollTarget::Completed
    }
}

/// The provider calls the reconciliation core depends on.
/// Implemented by the ARM HTTP client and by an in-memory fake.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// List every resource in a resource group.
    async fn list_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceState>>;

    /// Fetch metadata for a provider namespace. `None` if the namespace is unknown.
    async fn get_provider(
        &self,
        subscription_id: &str,
        namespace: &str,
    ) -> Result<Option<ProviderMetadata>>;

    /// Submit an update that replaces the resource's whole tag field.
    async fn begin_update(
        &self,
        resource: &ResourceState,
        api_version: &ApiVersion,
        tags: &TagSet,
    ) -> Result<OperationHandle>;

    /// Report the current status of a submitted update.
    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus>;

    /// Best-effort cancel. The change may already be irreversibly in progress.
    async fn cancel_operation(&self, handle: &OperationHandle) -> Result<()>;

    /// Read a resource by its full id.
    async fn get_resource(
        &self,
        resource_id: &str,
        api_version: &ApiVersion,
    ) -> Result<ResourceState>;
}
