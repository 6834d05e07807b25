use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::resource::models::{ResourceIdentity, ResourceState};
use crate::tags::TagSet;

/// The exact tags a resource carried when an update was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackSnapshot {
    pub identity: ResourceIdentity,
    pub resource: ResourceState,
    pub tags: TagSet,
    pub captured_at: DateTime<Utc>,
}

impl RollbackSnapshot {
    pub fn resource_id(&self) -> &str {
        &self.resource.id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource.resource_type
    }
}

/// Holds at most one snapshot per resource identity. Single-level: capturing
/// a new snapshot for an identity supersedes its previous one, and a snapshot
/// is consumed by the one rollback that uses it.
#[derive(Debug, Default)]
pub struct RollbackManager {
    snapshots: DashMap<String, RollbackSnapshot>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the provider-observed state right before submission.
    pub fn snapshot(&self, identity: &ResourceIdentity, observed: &ResourceState) {
        let snapshot = RollbackSnapshot {
            identity: identity.clone(),
            resource: observed.clone(),
            tags: observed.tags.clone(),
            captured_at: Utc::now(),
        };
        debug!(resource = %observed.id, tags = %snapshot.tags, "Captured rollback snapshot");
        self.snapshots.insert(identity.key(), snapshot);
    }

    /// Remove and return the snapshot held for `identity`.
    pub fn take(&self, identity: &ResourceIdentity) -> Option<RollbackSnapshot> {
        self.snapshots.remove(&identity.key()).map(|(_, s)| s)
    }

    /// Drop the snapshot for `identity`; a new update cycle is starting.
    pub fn clear(&self, identity: &ResourceIdentity) {
        self.snapshots.remove(&identity.key());
    }

    pub fn has_snapshot(&self, identity: &ResourceIdentity) -> bool {
        self.snapshots.contains_key(&identity.key())
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<RollbackSnapshot> {
        self.snapshots.get(&identity.key()).map(|s| s.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> ResourceIdentity {
        ResourceIdentity::new("sub", "rg", name).unwrap()
    }

    fn state(name: &str, owner: &str) -> ResourceState {
        ResourceState::new(&format!("/id/{}", name), name, "Microsoft.Web/sites", "eastus")
            .with_tags([("owner", owner)].into_iter().collect())
    }

    #[test]
    fn snapshot_is_consumed_once() {
        let manager = RollbackManager::new();
        let id = identity("web");
        manager.snapshot(&id, &state("web", "alice"));

        let taken = manager.take(&id).unwrap();
        assert_eq!(taken.tags.get("owner"), Some("alice"));
        assert_eq!(taken.resource_id(), "/id/web");
        assert!(manager.take(&id).is_none());
    }

    #[test]
    fn other_identity_cannot_take_snapshot() {
        let manager = RollbackManager::new();
        manager.snapshot(&identity("web"), &state("web", "alice"));

        assert!(manager.take(&identity("db")).is_none());
        manager.clear(&identity("db"));
        assert!(manager.has_snapshot(&identity("web")));
    }

    #[test]
    fn snapshots_are_kept_per_identity() {
        let manager = RollbackManager::new();
        manager.snapshot(&identity("web"), &state("web", "alice"));
        manager.snapshot(&identity("db"), &state("db", "bob"));

        assert_eq!(manager.get(&identity("web")).unwrap().tags.get("owner"), Some("alice"));
        assert_eq!(manager.get(&identity("db")).unwrap().tags.get("owner"), Some("bob"));
    }

    #[test]
    fn new_snapshot_supersedes_previous_for_same_identity() {
        let manager = RollbackManager::new();
        let id = identity("web");
        manager.snapshot(&id, &state("web", "alice"));
        manager.snapshot(&id, &state("web", "carol"));

        let taken = manager.take(&id).unwrap();
        assert_eq!(taken.tags.get("owner"), Some("carol"));
        assert!(!manager.has_snapshot(&id));
    }
}
