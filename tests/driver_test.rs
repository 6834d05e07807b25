mod common;

use std::time::Duration;

use common::*;
use tagsync::error::TagError;
use tagsync::executor::{FailurePolicy, OperationStatus, OutcomeStatus, RollbackOutcome};
use tagsync::resource::ResourceIdentity;
use tagsync::tags::RequestedTags;

fn request(owner: &str, application: &str, environment: &str, cost_center: &str) -> RequestedTags {
    RequestedTags {
        owner: Some(owner.to_string()),
        application: Some(application.to_string()),
        environment: Some(environment.to_string()),
        cost_center: Some(cost_center.to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_merges_and_submits_full_tag_set() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);

    let requested = request("", "billing", "", "").to_tag_set();
    let outcome = driver.reconcile(&identity("web"), &requested).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Updated);
    assert_eq!(outcome.diff.keys().collect::<Vec<_>>(), vec!["application"]);
    assert_eq!(outcome.previous, Some(tags(&[("owner", "alice")])));

    let expected = tags(&[("owner", "alice"), ("application", "billing")]);
    let submissions = provider.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].tags, expected);
    assert_eq!(submissions[0].api_version, "2023-01-01");
    assert_eq!(provider.tags_of(&web_id("web")), Some(expected.clone()));
    assert_eq!(outcome.state.unwrap().tags, expected);

    assert_eq!(
        audit.labels(),
        vec!["located", "merged", "submitted", "succeeded"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_blank_request_is_a_no_op() {
    let provider = provider_with(&[web("web", &[])]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);

    let outcome = driver
        .reconcile(&identity("web"), &RequestedTags::default().to_tag_set())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Unchanged);
    assert!(outcome.diff.is_empty());
    assert!(provider.submissions().is_empty());
    assert!(!driver.has_snapshot(&identity("web")));
    assert!(audit
        .lines()
        .iter()
        .any(|l| l == "Tags for resource 'web' are already up to date."));

    let rollback = driver.rollback(&identity("web")).await.unwrap();
    assert_eq!(rollback, RollbackOutcome::NothingToRollBack);
    assert!(provider.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rollback_restores_exact_tags_including_unrelated_keys() {
    let original = [("owner", "alice"), ("team", "core"), ("Environment", "Prod")];
    let provider = provider_with(&[web("web", &original)]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);

    let requested = request("bob", "", "dev", "").to_tag_set();
    let outcome = driver.reconcile(&identity("web"), &requested).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Updated);
    assert!(driver.has_snapshot(&identity("web")));

    let rollback = driver.rollback(&identity("web")).await.unwrap();
    let RollbackOutcome::RolledBack(state) = rollback else {
        panic!("expected a rollback, got {:?}", rollback);
    };
    assert_eq!(state.tags, tags(&original));
    assert_eq!(provider.tags_of(&web_id("web")), Some(tags(&original)));
    assert_eq!(provider.submissions()[1].tags, tags(&original));
    assert!(audit.labels().contains(&"rolled_back"));

    // A snapshot is used once.
    assert_eq!(
        driver.rollback(&identity("web")).await.unwrap(),
        RollbackOutcome::NothingToRollBack
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_update_rolls_back_but_still_reports_failure() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    provider.script_next_update(vec![
        OperationStatus::Pending,
        OperationStatus::Running,
        OperationStatus::Failed("RequestDisallowedByPolicy".to_string()),
    ]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);

    let requested = request("bob", "", "", "").to_tag_set();
    let outcome = driver.reconcile(&identity("web"), &requested).await.unwrap();

    assert_eq!(
        outcome.status,
        OutcomeStatus::Failed("RequestDisallowedByPolicy".to_string())
    );
    assert!(matches!(outcome.rollback, Some(RollbackOutcome::RolledBack(_))));

    let submissions = provider.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[1].tags, tags(&[("owner", "alice")]));
    assert_eq!(provider.tags_of(&web_id("web")), Some(tags(&[("owner", "alice")])));

    let labels = audit.labels();
    assert!(labels.contains(&"failed"));
    assert!(labels.contains(&"rolled_back"));
}

#[tokio::test(start_paused = true)]
async fn test_submit_error_is_a_failed_outcome() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    provider.fail_next_submit("AuthorizationFailed");
    let (driver, _audit) = driver(&provider, FailurePolicy::ReportOnly);

    let outcome = driver
        .reconcile(&identity("web"), &request("bob", "", "", "").to_tag_set())
        .await
        .unwrap();

    match outcome.status {
        OutcomeStatus::Failed(message) => assert!(message.contains("AuthorizationFailed")),
        other => panic!("expected failure, got {}", other),
    }
    assert!(outcome.rollback.is_none());
    assert!(provider.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_polling_yields_canceled() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    provider.script_next_update(vec![OperationStatus::Running]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);
    let web = identity("web");

    let requested = request("bob", "", "", "").to_tag_set();
    let (outcome, signalled) = tokio::join!(driver.reconcile(&web, &requested), async {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        driver.cancel(&web)
    });
    let outcome = outcome.unwrap();
    assert!(signalled);

    assert_eq!(outcome.status, OutcomeStatus::Canceled);
    assert!(outcome.rollback.is_none());
    assert_eq!(provider.cancellations().len(), 1);
    assert_eq!(provider.tags_of(&web_id("web")), Some(tags(&[("owner", "alice")])));

    let labels = audit.labels();
    assert!(labels.contains(&"canceled"));
    assert!(!labels.contains(&"succeeded"));
    assert!(!labels.contains(&"failed"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_with_nothing_in_flight_does_not_carry_over() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    let (driver, _audit) = driver(&provider, FailurePolicy::Rollback);

    assert!(!driver.cancel(&identity("web")));
    driver.cancel_all();
    let outcome = driver
        .reconcile(&identity("web"), &request("bob", "", "", "").to_tag_set())
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Updated);
}

#[tokio::test(start_paused = true)]
async fn test_provider_reported_cancel_yields_canceled() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    provider.script_next_update(vec![OperationStatus::Running, OperationStatus::Canceled]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);

    let outcome = driver
        .reconcile(&identity("web"), &request("bob", "", "", "").to_tag_set())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Canceled);
    assert!(outcome.rollback.is_none());
    // Nobody asked the provider to cancel; it reported the cancel itself.
    assert!(provider.cancellations().is_empty());
    assert_eq!(provider.polls(), 2);
    assert_eq!(provider.tags_of(&web_id("web")), Some(tags(&[("owner", "alice")])));

    let labels = audit.labels();
    assert!(labels.contains(&"canceled"));
    assert!(!labels.contains(&"failed"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_resources_keep_their_own_snapshots() {
    let provider = provider_with(&[
        web("a", &[("owner", "alice")]),
        web("b", &[("owner", "bert")]),
    ]);
    provider.script_next_update(vec![
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Failed("boom".to_string()),
    ]);
    provider.script_next_update(vec![
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Succeeded,
    ]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);
    let (a, b) = (identity("a"), identity("b"));
    let requested = request("carol", "", "", "").to_tag_set();

    let (first, second) = tokio::join!(driver.reconcile(&a, &requested), async {
        while provider.submissions().is_empty() {
            tokio::task::yield_now().await;
        }
        driver.reconcile(&b, &requested).await
    });
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.status, OutcomeStatus::Failed("boom".to_string()));
    let Some(RollbackOutcome::RolledBack(restored)) = first.rollback else {
        panic!("expected a rollback of 'a', got {:?}", first.rollback);
    };
    assert_eq!(restored.tags, tags(&[("owner", "alice")]));
    assert_eq!(provider.tags_of(&web_id("a")), Some(tags(&[("owner", "alice")])));

    assert_eq!(second.status, OutcomeStatus::Updated);
    assert!(second.rollback.is_none());
    assert_eq!(provider.tags_of(&web_id("b")), Some(tags(&[("owner", "carol")])));

    assert!(!driver.has_snapshot(&a));
    let kept = driver.snapshot(&b).unwrap();
    assert_eq!(kept.tags, tags(&[("owner", "bert")]));
    assert_eq!(audit.labels().iter().filter(|l| **l == "rolled_back").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_only_reaches_the_named_resource() {
    let provider = provider_with(&[
        web("a", &[("owner", "alice")]),
        web("b", &[("owner", "bert")]),
    ]);
    provider.script_next_update(vec![OperationStatus::Running]);
    provider.script_next_update(vec![
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Succeeded,
    ]);
    let (driver, _audit) = driver(&provider, FailurePolicy::Rollback);
    let (a, b) = (identity("a"), identity("b"));
    let requested = request("carol", "", "", "").to_tag_set();

    let (first, second, signalled) = tokio::join!(
        driver.reconcile(&a, &requested),
        async {
            while provider.submissions().is_empty() {
                tokio::task::yield_now().await;
            }
            driver.reconcile(&b, &requested).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            driver.cancel(&a)
        }
    );

    assert!(signalled);
    assert_eq!(first.unwrap().status, OutcomeStatus::Canceled);
    assert_eq!(second.unwrap().status, OutcomeStatus::Updated);
    assert_eq!(provider.cancellations().len(), 1);
    assert_eq!(provider.tags_of(&web_id("a")), Some(tags(&[("owner", "alice")])));
    assert_eq!(provider.tags_of(&web_id("b")), Some(tags(&[("owner", "carol")])));
}

#[tokio::test(start_paused = true)]
async fn test_second_request_for_same_resource_is_busy() {
    let provider = provider_with(&[web("web", &[("owner", "alice")])]);
    provider.script_next_update(vec![
        OperationStatus::Running,
        OperationStatus::Running,
        OperationStatus::Succeeded,
    ]);
    let (driver, _audit) = driver(&provider, FailurePolicy::Rollback);
    let requested = request("bob", "", "", "").to_tag_set();
    let web = identity("web");
    let typed = identity("web").with_type(Some(WEB_TYPE));

    let (first, second) = tokio::join!(driver.reconcile(&web, &requested), async {
        while !driver.is_in_flight(&web) {
            tokio::task::yield_now().await;
        }
        driver.reconcile(&typed, &requested).await
    });

    assert_eq!(first.unwrap().status, OutcomeStatus::Updated);
    assert!(matches!(second, Err(TagError::Busy(_))));
    assert!(!driver.is_in_flight(&web));
    assert_eq!(provider.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_resource_and_unknown_type() {
    let odd = tagsync::resource::ResourceState::new(
        "/subscriptions/sub-1/resourceGroups/rg-app/providers/Contoso.Widgets/gadgets/g1",
        "g1",
        "Contoso.Widgets/gadgets",
        "eastus",
    );
    let provider = provider_with(&[odd]);
    let (driver, audit) = driver(&provider, FailurePolicy::Rollback);
    let requested = request("bob", "", "", "").to_tag_set();

    let missing = driver.reconcile(&identity("nope"), &requested).await.unwrap();
    assert_eq!(missing.status, OutcomeStatus::NotFound);

    let unresolved = driver.reconcile(&identity("g1"), &requested).await.unwrap();
    assert_eq!(unresolved.status, OutcomeStatus::ApiVersionUnresolved);
    assert!(!driver.has_snapshot(&identity("g1")));
    assert!(provider.submissions().is_empty());
    assert!(audit.labels().contains(&"api_version_unresolved"));
}

#[tokio::test(start_paused = true)]
async fn test_type_filter_is_exact() {
    let provider = provider_with(&[web("web", &[])]);
    let (driver, _audit) = driver(&provider, FailurePolicy::Rollback);
    let requested = request("bob", "", "", "").to_tag_set();

    let wrong_case = ResourceIdentity::new(SUB, RG, "web")
        .unwrap()
        .with_type(Some("microsoft.web/sites"));
    let outcome = driver.reconcile(&wrong_case, &requested).await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::NotFound);
}

#[tokio::test(start_paused = true)]
async fn test_listing_failure_is_reported_not_raised() {
    let provider = provider_with(&[web("web", &[])]);
    provider.fail_listing("ExpiredAuthenticationToken");
    let (driver, _audit) = driver(&provider, FailurePolicy::Rollback);

    let outcome = driver
        .reconcile(&identity("web"), &request("bob", "", "", "").to_tag_set())
        .await
        .unwrap();
    assert!(outcome.status.is_failure());
    assert!(outcome.rollback.is_none());
}
