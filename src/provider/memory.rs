use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{OperationHandle, PollTarget, ProviderMetadata, ProviderResourceType, ResourceProvider};
use crate::executor::operation::OperationStatus;
use crate::resolver::ApiVersion;
use crate::resource::models::ResourceState;
use crate::tags::TagSet;

/// A recorded `begin_update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub resource_id: String,
    pub api_version: String,
    pub tags: TagSet,
}

#[derive(Debug)]
struct StoredResource {
    subscription_id: String,
    resource_group: String,
    state: ResourceState,
}

#[derive(Debug)]
struct TrackedOperation {
    resource_id: String,
    tags: TagSet,
    remaining: VecDeque<OperationStatus>,
}

#[derive(Debug, Default)]
struct Inner {
    resources: Vec<StoredResource>,
    providers: HashMap<String, ProviderMetadata>,
    scripts: VecDeque<Vec<OperationStatus>>,
    submit_errors: VecDeque<String>,
    list_error: Option<String>,
    operations: HashMap<String, TrackedOperation>,
    submissions: Vec<Submission>,
    cancellations: Vec<String>,
    provider_lookups: usize,
    polls: usize,
}

/// A scriptable provider that keeps resources in memory.
///
/// Each update follows the next queued status script: one status per poll,
/// the last one repeating. An empty script completes synchronously. With no
/// script queued the update succeeds on the first poll. Tags are applied to
/// the stored resource when an operation reaches `Succeeded`.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    inner: Mutex<Inner>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_resource(self, subscription_id: &str, resource_group: &str, state: ResourceState) -> Self {
        self.lock().resources.push(StoredResource {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            state,
        });
        self
    }

    /// Declare a resource type and its API versions (newest first).
    pub fn with_api_versions(self, namespace: &str, type_name: &str, versions: &[&str]) -> Self {
        {
            let mut inner = self.lock();
            let metadata = inner
                .providers
                .entry(namespace.to_string())
                .or_insert_with(|| ProviderMetadata {
                    namespace: namespace.to_string(),
                    resource_types: Vec::new(),
                });
            metadata.resource_types.push(ProviderResourceType {
                resource_type: type_name.to_string(),
                api_versions: versions.iter().map(|v| v.to_string()).collect(),
            });
        }
        self
    }

    /// Queue the poll statuses for the next submitted update.
    pub fn script_next_update(&self, statuses: Vec<OperationStatus>) {
        self.lock().scripts.push_back(statuses);
    }

    /// Make the next `begin_update` call fail outright.
    pub fn fail_next_submit(&self, message: &str) {
        self.lock().submit_errors.push_back(message.to_string());
    }

    /// Make every listing fail, as an expired credential would.
    pub fn fail_listing(&self, message: &str) {
        self.lock().list_error = Some(message.to_string());
    }

    pub fn tags_of(&self, resource_id: &str) -> Option<TagSet> {
        self.lock()
            .resources
            .iter()
            .find(|r| r.state.id == resource_id)
            .map(|r| r.state.tags.clone())
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    pub fn cancellations(&self) -> Vec<String> {
        self.lock().cancellations.clone()
    }

    pub fn provider_lookups(&self) -> usize {
        self.lock().provider_lookups
    }

    pub fn polls(&self) -> usize {
        self.lock().polls
    }
}

fn apply_tags(inner: &mut Inner, resource_id: &str, tags: &TagSet) {
    if let Some(r) = inner.resources.iter_mut().find(|r| r.state.id == resource_id) {
        r.state.tags = tags.clone();
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    async fn list_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceState>> {
        let inner = self.lock();
        if let Some(message) = &inner.list_error {
            bail!("{}", message);
        }
        Ok(inner
            .resources
            .iter()
            .filter(|r| r.subscription_id == subscription_id && r.resource_group == resource_group)
            .map(|r| r.state.clone())
            .collect())
    }

    async fn get_provider(
        &self,
        _subscription_id: &str,
        namespace: &str,
    ) -> Result<Option<ProviderMetadata>> {
        let mut inner = self.lock();
        inner.provider_lookups += 1;
        Ok(inner.providers.get(namespace).cloned())
    }

    async fn begin_update(
        &self,
        resource: &ResourceState,
        api_version: &ApiVersion,
        tags: &TagSet,
    ) -> Result<OperationHandle> {
        let mut inner = self.lock();
        if let Some(message) = inner.submit_errors.pop_front() {
            bail!("{}", message);
        }
        inner.submissions.push(Submission {
            resource_id: resource.id.clone(),
            api_version: api_version.to_string(),
            tags: tags.clone(),
        });

        let script = inner
            .scripts
            .pop_front()
            .unwrap_or_else(|| vec![OperationStatus::Succeeded]);

        if script.is_empty() {
            apply_tags(&mut inner, &resource.id, tags);
            return Ok(OperationHandle::new(
                &resource.id,
                api_version.clone(),
                PollTarget::Completed,
            ));
        }

        let handle = OperationHandle::new(&resource.id, api_version.clone(), PollTarget::Tracked);
        inner.operations.insert(
            handle.id.clone(),
            TrackedOperation {
                resource_id: resource.id.clone(),
                tags: tags.clone(),
                remaining: script.into(),
            },
        );
        Ok(handle)
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let mut inner = self.lock();
        inner.polls += 1;
        let op = inner
            .operations
            .get_mut(&handle.id)
            .ok_or_else(|| anyhow!("unknown operation {}", handle.id))?;

        let status = if op.remaining.len() > 1 {
            op.remaining.pop_front()
        } else {
            op.remaining.front().cloned()
        }
        .unwrap_or(OperationStatus::Succeeded);

        if status == OperationStatus::Succeeded {
            let (resource_id, tags) = (op.resource_id.clone(), op.tags.clone());
            apply_tags(&mut inner, &resource_id, &tags);
        }
        Ok(status)
    }

    async fn cancel_operation(&self, handle: &OperationHandle) -> Result<()> {
        self.lock().cancellations.push(handle.id.clone());
        Ok(())
    }

    async fn get_resource(
        &self,
        resource_id: &str,
        _api_version: &ApiVersion,
    ) -> Result<ResourceState> {
        self.lock()
            .resources
            .iter()
            .find(|r| r.state.id == resource_id)
            .map(|r| r.state.clone())
            .ok_or_else(|| anyhow!("resource {} not found", resource_id))
    }
}
