pub mod trail;

use std::fmt;

use crate::executor::operation::OperationKind;
use crate::tags::{TagDiff, TagSet};

pub use trail::{open_or_trace, FileAuditTrail, MemoryAuditTrail, TracingAuditTrail};

/// A lifecycle transition worth recording.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    Located {
        resource: String,
        resource_id: String,
        tags: TagSet,
    },
    NotFound {
        resource: String,
    },
    Merged {
        resource: String,
        diff: TagDiff,
    },
    Unchanged {
        resource: String,
    },
    ApiVersionUnresolved {
        resource: String,
        resource_type: String,
    },
    Submitted {
        resource: String,
        kind: OperationKind,
        api_version: String,
    },
    Canceled {
        resource: String,
        kind: OperationKind,
    },
    Succeeded {
        resource: String,
        kind: OperationKind,
        tags: TagSet,
    },
    Failed {
        resource: String,
        kind: OperationKind,
        error: String,
    },
    RolledBack {
        resource: String,
        tags: TagSet,
    },
    NothingToRollBack {
        resource: String,
    },
}

impl AuditEvent {
    /// Short machine-friendly name of the transition.
    pub fn label(&self) -> &'static str {
        match self {
            AuditEvent::Located { .. } => "located",
            AuditEvent::NotFound { .. } => "not_found",
            AuditEvent::Merged { .. } => "merged",
            AuditEvent::Unchanged { .. } => "unchanged",
            AuditEvent::ApiVersionUnresolved { .. } => "api_version_unresolved",
            AuditEvent::Submitted { .. } => "submitted",
            AuditEvent::Canceled { .. } => "canceled",
            AuditEvent::Succeeded { .. } => "succeeded",
            AuditEvent::Failed { .. } => "failed",
            AuditEvent::RolledBack { .. } => "rolled_back",
            AuditEvent::NothingToRollBack { .. } => "nothing_to_roll_back",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::Located {
                resource,
                resource_id,
                tags,
            } => write!(
                f,
                "Located resource '{}' ({}). Current tags: {}",
                resource, resource_id, tags
            ),
            AuditEvent::NotFound { resource } => write!(f, "Resource {} not found.", resource),
            AuditEvent::Merged { resource, diff } => {
                write!(f, "Tag changes for resource '{}': {}", resource, diff)
            }
            AuditEvent::Unchanged { resource } => {
                write!(f, "Tags for resource '{}' are already up to date.", resource)
            }
            AuditEvent::ApiVersionUnresolved {
                resource,
                resource_type,
            } => write!(
                f,
                "Could not resolve an API version for type '{}' of resource '{}'.",
                resource_type, resource
            ),
            AuditEvent::Submitted {
                resource,
                kind: OperationKind::Update,
                api_version,
            } => write!(
                f,
                "Updating tags for resource '{}' (api-version {}).",
                resource, api_version
            ),
            AuditEvent::Submitted {
                resource,
                kind: OperationKind::Rollback,
                api_version,
            } => write!(
                f,
                "Rolling back tags for resource '{}' (api-version {}).",
                resource, api_version
            ),
            AuditEvent::Canceled { resource, kind } => write!(
                f,
                "{} for resource '{}' cancelled during execution.",
                capitalize(kind),
                resource
            ),
            AuditEvent::Succeeded {
                resource,
                kind,
                tags,
            } => write!(
                f,
                "{} succeeded for resource '{}'. Tags now: {}",
                capitalize(kind),
                resource,
                tags
            ),
            AuditEvent::Failed {
                resource,
                kind,
                error,
            } => write!(
                f,
                "{} failed for resource '{}'. Error: {}",
                capitalize(kind),
                resource,
                error
            ),
            AuditEvent::RolledBack { resource, tags } => write!(
                f,
                "Successfully rolled back tags for resource '{}'. Rolled back tags: {}",
                resource, tags
            ),
            AuditEvent::NothingToRollBack { resource } => {
                write!(f, "Nothing to roll back for resource '{}'.", resource)
            }
        }
    }
}

fn capitalize(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Update => "Update",
        OperationKind::Rollback => "Rollback",
    }
}

/// Append-only sink for lifecycle events. Sinks are never read back by the
/// core; a sink that cannot write logs the problem and carries on.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}
