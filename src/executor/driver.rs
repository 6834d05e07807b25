use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use super::cancel::CancelFlag;
use super::operation::OperationKind;
use super::orchestrator::{OperationOutcome, UpdateOrchestrator, DEFAULT_POLL_INTERVAL};
use super::rollback::{RollbackManager, RollbackSnapshot};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{TagError, TagResult};
use crate::provider::ResourceProvider;
use crate::resolver::{ApiVersion, ApiVersionResolver, FirstListed, VersionPolicy};
use crate::resource::{ResourceIdentity, ResourceLocator, ResourceState};
use crate::tags::{merge, TagDiff, TagSet};

/// What to do when an update fails mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Restore the pre-update snapshot (single-resource flow).
    Rollback,
    /// Report and move on (batch flow).
    ReportOnly,
}

/// Terminal status of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Updated,
    Unchanged,
    NotFound,
    ApiVersionUnresolved,
    Canceled,
    Failed(String),
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Updated => "Updated",
            OutcomeStatus::Unchanged => "Unchanged",
            OutcomeStatus::NotFound => "NotFound",
            OutcomeStatus::ApiVersionUnresolved => "ApiVersionUnresolved",
            OutcomeStatus::Canceled => "Canceled",
            OutcomeStatus::Failed(_) => "Failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::Failed(_))
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Failed(msg) => write!(f, "Failed ({})", msg),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of a rollback request.
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackOutcome {
    NothingToRollBack,
    RolledBack(ResourceState),
    ApiVersionUnresolved,
    Canceled,
    Failed(String),
}

/// Everything a caller needs to report one reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub identity: ResourceIdentity,
    pub status: OutcomeStatus,
    pub diff: TagDiff,
    /// Tags observed before any change was submitted.
    pub previous: Option<TagSet>,
    /// Latest known provider state.
    pub state: Option<ResourceState>,
    /// Set when a failure triggered an automatic rollback.
    pub rollback: Option<RollbackOutcome>,
}

impl ReconcileOutcome {
    fn new(identity: &ResourceIdentity, status: OutcomeStatus) -> Self {
        Self {
            identity: identity.clone(),
            status,
            diff: TagDiff::default(),
            previous: None,
            state: None,
            rollback: None,
        }
    }
}

/// Tunables for a driver.
#[derive(Clone)]
pub struct DriverOptions {
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
    pub version_policy: Arc<dyn VersionPolicy>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            failure_policy: FailurePolicy::Rollback,
            version_policy: Arc::new(FirstListed),
        }
    }
}

/// One in-flight cycle. Owns the cycle's cancel flag and removes the
/// identity from the in-flight map when dropped.
struct InFlightGuard {
    in_flight: Arc<DashMap<String, CancelFlag>>,
    key: String,
    cancel: CancelFlag,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Runs reconciliation cycles and owns all mutable coordination state: the
/// per-identity rollback snapshots and the resources with an operation in
/// flight, each with its own cancel flag. Worker tasks only read their
/// flag and hand back outcomes.
pub struct ReconcileDriver {
    locator: ResourceLocator,
    resolver: ApiVersionResolver,
    orchestrator: UpdateOrchestrator,
    rollback: RollbackManager,
    audit: Arc<dyn AuditSink>,
    in_flight: Arc<DashMap<String, CancelFlag>>,
    failure_policy: FailurePolicy,
}

impl ReconcileDriver {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        audit: Arc<dyn AuditSink>,
        options: DriverOptions,
    ) -> Self {
        Self {
            locator: ResourceLocator::new(Arc::clone(&provider)),
            resolver: ApiVersionResolver::with_policy(Arc::clone(&provider), options.version_policy),
            orchestrator: UpdateOrchestrator::new(
                provider,
                Arc::clone(&audit),
                options.poll_interval,
            ),
            rollback: RollbackManager::new(),
            audit,
            in_flight: Arc::new(DashMap::new()),
            failure_policy: options.failure_policy,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Request cancellation of the cycle in flight for `identity`. Returns
    /// false when nothing is in flight; a later cycle starts uncancelled.
    pub fn cancel(&self, identity: &ResourceIdentity) -> bool {
        match self.in_flight.get(&identity.key()) {
            Some(flag) => {
                flag.value().cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every cycle currently in flight.
    pub fn cancel_all(&self) {
        for flag in self.in_flight.iter() {
            flag.value().cancel();
        }
    }

    pub fn is_in_flight(&self, identity: &ResourceIdentity) -> bool {
        self.in_flight.contains_key(&identity.key())
    }

    pub fn has_snapshot(&self, identity: &ResourceIdentity) -> bool {
        self.rollback.has_snapshot(identity)
    }

    pub fn snapshot(&self, identity: &ResourceIdentity) -> Option<RollbackSnapshot> {
        self.rollback.get(identity)
    }

    /// Locate, merge, and apply the requested tags to one resource.
    ///
    /// Only a concurrent request for the same resource is an error; every
    /// other result, including provider failures, is an outcome.
    pub async fn reconcile(
        &self,
        identity: &ResourceIdentity,
        requested: &TagSet,
    ) -> TagResult<ReconcileOutcome> {
        let guard = self.begin(identity)?;
        self.rollback.clear(identity);

        let resource = match self.locator.locate(identity).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                self.audit.record(&AuditEvent::NotFound {
                    resource: identity.to_string(),
                });
                return Ok(ReconcileOutcome::new(identity, OutcomeStatus::NotFound));
            }
            Err(e) => return Ok(self.lookup_failed(identity, e)),
        };
        self.audit.record(&AuditEvent::Located {
            resource: resource.name.clone(),
            resource_id: resource.id.clone(),
            tags: resource.tags.clone(),
        });

        let merged = merge(&resource.tags, requested);
        let mut outcome = ReconcileOutcome::new(identity, OutcomeStatus::Unchanged);
        outcome.previous = Some(resource.tags.clone());
        outcome.diff = merged.diff.clone();

        if !merged.changed {
            self.audit.record(&AuditEvent::Unchanged {
                resource: resource.name.clone(),
            });
            outcome.state = Some(resource);
            return Ok(outcome);
        }
        self.audit.record(&AuditEvent::Merged {
            resource: resource.name.clone(),
            diff: merged.diff.clone(),
        });

        let api_version = match self
            .resolver
            .resolve(identity.subscription_id(), &resource.resource_type)
            .await
        {
            Ok(Some(version)) => version,
            Ok(None) => {
                self.audit.record(&AuditEvent::ApiVersionUnresolved {
                    resource: resource.name.clone(),
                    resource_type: resource.resource_type.clone(),
                });
                outcome.status = OutcomeStatus::ApiVersionUnresolved;
                outcome.state = Some(resource);
                return Ok(outcome);
            }
            Err(e) => {
                let failed = self.lookup_failed(identity, e);
                outcome.status = failed.status;
                outcome.state = Some(resource);
                return Ok(outcome);
            }
        };

        self.rollback.snapshot(identity, &resource);
        info!(resource = %resource.id, api_version = %api_version, diff = %merged.diff, "Submitting tag update");

        match self
            .run_worker(
                resource.clone(),
                api_version,
                merged.merged,
                OperationKind::Update,
                &guard.cancel,
            )
            .await
        {
            OperationOutcome::Succeeded(state) => {
                outcome.status = OutcomeStatus::Updated;
                outcome.state = Some(state);
            }
            OperationOutcome::Canceled => {
                outcome.status = OutcomeStatus::Canceled;
                outcome.state = Some(resource);
            }
            OperationOutcome::Failed(message) => {
                warn!(resource = %resource.id, error = %message, "Tag update failed");
                outcome.status = OutcomeStatus::Failed(message);
                outcome.state = Some(resource);
                if self.failure_policy == FailurePolicy::Rollback {
                    outcome.rollback = Some(self.restore(identity, &guard.cancel).await);
                }
            }
        }

        Ok(outcome)
    }

    /// Restore the tags captured before the most recent update of `identity`.
    pub async fn rollback(&self, identity: &ResourceIdentity) -> TagResult<RollbackOutcome> {
        let guard = self.begin(identity)?;
        Ok(self.restore(identity, &guard.cancel).await)
    }

    /// Rollback body, shared by manual and automatic rollback. Runs under the
    /// caller's in-flight guard and never captures a new snapshot.
    async fn restore(&self, identity: &ResourceIdentity, cancel: &CancelFlag) -> RollbackOutcome {
        let Some(snapshot) = self.rollback.take(identity) else {
            self.audit.record(&AuditEvent::NothingToRollBack {
                resource: identity.resource_name().to_string(),
            });
            return RollbackOutcome::NothingToRollBack;
        };

        let api_version = match self
            .resolver
            .resolve_fresh(identity.subscription_id(), snapshot.resource_type())
            .await
        {
            Ok(Some(version)) => version,
            Ok(None) => {
                self.audit.record(&AuditEvent::ApiVersionUnresolved {
                    resource: snapshot.resource.name.clone(),
                    resource_type: snapshot.resource_type().to_string(),
                });
                return RollbackOutcome::ApiVersionUnresolved;
            }
            Err(e) => {
                let message = e.to_string();
                self.audit.record(&AuditEvent::Failed {
                    resource: snapshot.resource.name.clone(),
                    kind: OperationKind::Rollback,
                    error: message.clone(),
                });
                return RollbackOutcome::Failed(message);
            }
        };

        info!(resource = %snapshot.resource_id(), tags = %snapshot.tags, "Rolling back tags");
        match self
            .run_worker(
                snapshot.resource.clone(),
                api_version,
                snapshot.tags.clone(),
                OperationKind::Rollback,
                cancel,
            )
            .await
        {
            OperationOutcome::Succeeded(state) => {
                self.audit.record(&AuditEvent::RolledBack {
                    resource: snapshot.resource.name.clone(),
                    tags: snapshot.tags.clone(),
                });
                RollbackOutcome::RolledBack(state)
            }
            OperationOutcome::Canceled => RollbackOutcome::Canceled,
            OperationOutcome::Failed(message) => RollbackOutcome::Failed(message),
        }
    }

    /// Submit and poll on a background task, leaving the caller free to
    /// signal cancellation.
    async fn run_worker(
        &self,
        resource: ResourceState,
        api_version: ApiVersion,
        tags: TagSet,
        kind: OperationKind,
        cancel: &CancelFlag,
    ) -> OperationOutcome {
        let orchestrator = self.orchestrator.clone();
        let cancel = cancel.clone();
        let worker = tokio::spawn(async move {
            orchestrator
                .run(&resource, &api_version, &tags, kind, &cancel)
                .await
        });

        match worker.await {
            Ok(outcome) => outcome,
            Err(e) => OperationOutcome::Failed(format!("{} worker stopped: {}", kind, e)),
        }
    }

    fn begin(&self, identity: &ResourceIdentity) -> TagResult<InFlightGuard> {
        let key = identity.key();
        let cancel = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => return Err(TagError::Busy(identity.resource_name().to_string())),
            Entry::Vacant(slot) => slot.insert(CancelFlag::new()).value().clone(),
        };
        Ok(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
            cancel,
        })
    }

    /// A provider call failed before anything was submitted.
    fn lookup_failed(&self, identity: &ResourceIdentity, error: anyhow::Error) -> ReconcileOutcome {
        let message = format!("{:#}", error);
        self.audit.record(&AuditEvent::Failed {
            resource: identity.resource_name().to_string(),
            kind: OperationKind::Update,
            error: message.clone(),
        });
        ReconcileOutcome::new(identity, OutcomeStatus::Failed(message))
    }
}
