#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tagsync::audit::MemoryAuditTrail;
use tagsync::executor::{DriverOptions, FailurePolicy, ReconcileDriver};
use tagsync::provider::memory::InMemoryProvider;
use tagsync::resource::{ResourceIdentity, ResourceState};
use tagsync::tags::TagSet;

pub const SUB: &str = "sub-1";
pub const RG: &str = "rg-app";
pub const WEB_TYPE: &str = "Microsoft.Web/sites";

pub fn web_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
        SUB, RG, WEB_TYPE, name
    )
}

pub fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs.iter().copied().collect()
}

pub fn web(name: &str, current: &[(&str, &str)]) -> ResourceState {
    ResourceState::new(&web_id(name), name, WEB_TYPE, "eastus").with_tags(tags(current))
}

pub fn identity(name: &str) -> ResourceIdentity {
    ResourceIdentity::new(SUB, RG, name).unwrap()
}

/// Provider with one web app and two declared API versions.
pub fn provider_with(resources: &[ResourceState]) -> Arc<InMemoryProvider> {
    let mut provider = InMemoryProvider::new().with_api_versions(
        "Microsoft.Web",
        "sites",
        &["2023-01-01", "2022-09-01"],
    );
    for r in resources {
        provider = provider.with_resource(SUB, RG, r.clone());
    }
    Arc::new(provider)
}

pub fn driver(
    provider: &Arc<InMemoryProvider>,
    policy: FailurePolicy,
) -> (ReconcileDriver, Arc<MemoryAuditTrail>) {
    let audit = Arc::new(MemoryAuditTrail::new());
    let driver = ReconcileDriver::new(
        provider.clone(),
        audit.clone(),
        DriverOptions {
            poll_interval: Duration::from_secs(1),
            failure_policy: policy,
            ..DriverOptions::default()
        },
    );
    (driver, audit)
}
