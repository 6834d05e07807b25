mod common;

use std::sync::Arc;

use common::*;
use tagsync::provider::memory::InMemoryProvider;
use tagsync::resolver::{ApiVersionResolver, StableFirst};

#[tokio::test]
async fn test_resolve_caches_per_run_and_fresh_bypasses_cache() {
    let provider = provider_with(&[]);
    let resolver = ApiVersionResolver::new(provider.clone());

    let first = resolver.resolve(SUB, WEB_TYPE).await.unwrap().unwrap();
    let second = resolver.resolve(SUB, WEB_TYPE).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "2023-01-01");
    assert_eq!(first.namespace(), "Microsoft.Web");
    assert_eq!(provider.provider_lookups(), 1);

    resolver.resolve_fresh(SUB, WEB_TYPE).await.unwrap();
    assert_eq!(provider.provider_lookups(), 2);
}

#[tokio::test]
async fn test_nested_type_splits_on_first_slash() {
    let provider = Arc::new(InMemoryProvider::new().with_api_versions(
        "Microsoft.Sql",
        "servers/databases",
        &["2023-05-01-preview", "2021-11-01"],
    ));
    let resolver = ApiVersionResolver::new(provider.clone());

    let version = resolver
        .resolve(SUB, "Microsoft.Sql/servers/databases")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.type_name(), "servers/databases");
    assert_eq!(version.as_str(), "2023-05-01-preview");

    let stable = ApiVersionResolver::with_policy(provider, Arc::new(StableFirst));
    let version = stable
        .resolve(SUB, "Microsoft.Sql/servers/databases")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.as_str(), "2021-11-01");
}

#[tokio::test]
async fn test_unresolved_cases() {
    let provider = provider_with(&[]);
    let resolver = ApiVersionResolver::new(provider.clone());

    // Unknown namespace, unknown type, no namespace at all, wrong case.
    for resource_type in [
        "Contoso.Widgets/gadgets",
        "Microsoft.Web/unknown",
        "sites",
        "Microsoft.Web/Sites",
    ] {
        assert!(
            resolver.resolve(SUB, resource_type).await.unwrap().is_none(),
            "{} should not resolve",
            resource_type
        );
    }
}
