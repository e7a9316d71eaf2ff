use super::common::*;
use std::time::Duration;

use crate::workflows::lifecycle::{
    CreationError, DeploymentStatus, DeploymentUpdate, HostingProvision, TenantRecord,
};

#[tokio::test]
async fn village7_is_provisioned_and_marked_deploying() {
    let hosting = FakeHosting::new(Behavior::Succeed);
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let registry = MemoryRegistry::seeded([village7()]);
    let orchestrator = creation(hosting.clone(), dispatcher.clone(), registry.clone());

    let outcome = orchestrator
        .on_created(&village7())
        .await
        .expect("creation succeeds");

    assert_eq!(hosting.created(), vec!["village7-abc123"]);
    assert_eq!(dispatcher.dispatched(), vec!["village7-abc123"]);
    assert_eq!(outcome.site_id.as_str(), "village7-abc123");
    assert_eq!(outcome.hosting, HostingProvision::Created);
    assert_eq!(outcome.domain, "village7-abc123.web.app");

    let stored = registry.record("village7").expect("record kept");
    assert_eq!(stored.deployment_status, DeploymentStatus::Deploying);
    assert_eq!(stored.deployment_triggered_at, Some(outcome.triggered_at));
    assert_eq!(stored.domain, "village7-abc123.web.app");
    assert!(stored.deployment_error.is_none());
}

#[tokio::test]
async fn existing_domain_is_not_overwritten() {
    let record = TenantRecord::new("village5", "village5", "council.village5.example");
    let registry = MemoryRegistry::seeded([record.clone()]);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Succeed),
        FakeDispatcher::new(Behavior::Succeed),
        registry.clone(),
    );

    let outcome = orchestrator.on_created(&record).await.expect("succeeds");

    assert_eq!(outcome.domain, "council.village5.example");
    match &registry.updates()[0].1 {
        DeploymentUpdate::Deploying { domain, .. } => assert!(domain.is_none()),
        other => panic!("unexpected update {other:?}"),
    }
}

#[tokio::test]
async fn domain_is_used_when_subdomain_is_missing() {
    let record = TenantRecord::new("village8", "", "village8.firebaseapp.com");
    let hosting = FakeHosting::new(Behavior::Succeed);
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let orchestrator = creation(
        hosting.clone(),
        dispatcher.clone(),
        MemoryRegistry::seeded([record.clone()]),
    );

    orchestrator.on_created(&record).await.expect("succeeds");

    assert_eq!(hosting.created(), vec!["village8"]);
    assert_eq!(dispatcher.dispatched(), vec!["village8"]);
}

#[tokio::test]
async fn custom_domain_without_subdomain_still_dispatches() {
    let record = TenantRecord::new("village5", "", "council.village5.example");
    let hosting = FakeHosting::new(Behavior::Fail);
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let registry = MemoryRegistry::seeded([record.clone()]);
    let orchestrator = creation(hosting.clone(), dispatcher.clone(), registry.clone());

    let outcome = orchestrator
        .on_created(&record)
        .await
        .expect("hosting rejection is not fatal");

    assert_eq!(hosting.created(), vec!["council.village5.example"]);
    assert!(matches!(outcome.hosting, HostingProvision::Failed { .. }));
    assert_eq!(dispatcher.dispatched(), vec!["council.village5.example"]);
    assert_eq!(
        registry.record("village5").expect("record kept").deployment_status,
        DeploymentStatus::Deploying
    );
}

#[tokio::test]
async fn missing_subdomain_aborts_without_side_effects() {
    let record = TenantRecord::new("village9", "", "");
    let hosting = FakeHosting::new(Behavior::Succeed);
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let registry = MemoryRegistry::seeded([record.clone()]);
    let orchestrator = creation(hosting.clone(), dispatcher.clone(), registry.clone());

    let error = orchestrator
        .on_created(&record)
        .await
        .expect_err("nothing to provision");

    assert!(matches!(
        error,
        CreationError::MissingSubdomain { ref tenant_id } if tenant_id.as_str() == "village9"
    ));
    assert!(hosting.created().is_empty());
    assert!(dispatcher.dispatched().is_empty());
    assert!(registry.updates().is_empty());
}

#[tokio::test]
async fn hosting_conflict_still_dispatches() {
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let registry = MemoryRegistry::seeded([village7()]);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Conflict),
        dispatcher.clone(),
        registry.clone(),
    );

    let outcome = orchestrator.on_created(&village7()).await.expect("succeeds");

    assert_eq!(outcome.hosting, HostingProvision::AlreadyExists);
    assert_eq!(dispatcher.dispatched(), vec!["village7-abc123"]);
    assert_eq!(
        registry.record("village7").map(|r| r.deployment_status),
        Some(DeploymentStatus::Deploying)
    );
}

#[tokio::test]
async fn hosting_failure_is_tolerated() {
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Fail),
        dispatcher.clone(),
        MemoryRegistry::seeded([village7()]),
    );

    let outcome = orchestrator.on_created(&village7()).await.expect("succeeds");

    assert!(matches!(outcome.hosting, HostingProvision::Failed { .. }));
    assert_eq!(dispatcher.dispatched().len(), 1);
}

#[tokio::test]
async fn dispatch_failure_marks_record_failed() {
    let registry = MemoryRegistry::seeded([village7()]);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Succeed),
        FakeDispatcher::new(Behavior::Fail),
        registry.clone(),
    );

    let error = orchestrator
        .on_created(&village7())
        .await
        .expect_err("dispatch failure propagates");
    assert!(matches!(error, CreationError::Dispatch(_)));

    let stored = registry.record("village7").expect("record kept");
    assert_eq!(stored.deployment_status, DeploymentStatus::Failed);
    let message = stored.deployment_error.expect("error recorded");
    assert!(message.contains("422"));
    assert!(stored.deployment_failed_at.is_some());
    assert!(stored.deployment_triggered_at.is_none());
}

#[tokio::test]
async fn unconfigured_dispatch_is_reported_after_hosting() {
    let hosting = FakeHosting::new(Behavior::Succeed);
    let dispatcher = FakeDispatcher::unconfigured();
    let registry = MemoryRegistry::seeded([village7()]);
    let orchestrator = creation(hosting.clone(), dispatcher.clone(), registry.clone());

    let error = orchestrator
        .on_created(&village7())
        .await
        .expect_err("not configured");

    assert!(matches!(error, CreationError::DispatchNotConfigured));
    assert_eq!(hosting.created(), vec!["village7-abc123"]);
    assert!(dispatcher.dispatched().is_empty());

    let stored = registry.record("village7").expect("record kept");
    assert_eq!(stored.deployment_status, DeploymentStatus::Failed);
    assert!(stored
        .deployment_error
        .unwrap_or_default()
        .contains("not configured"));
}

#[tokio::test]
async fn registry_failure_after_dispatch_is_returned() {
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Succeed),
        dispatcher.clone(),
        MemoryRegistry::unavailable(),
    );

    let error = orchestrator
        .on_created(&village7())
        .await
        .expect_err("registry write fails");

    assert!(matches!(error, CreationError::Registry(_)));
    assert_eq!(dispatcher.dispatched().len(), 1);
}

#[tokio::test]
async fn registry_failure_while_recording_dispatch_failure_keeps_dispatch_error() {
    let registry = MemoryRegistry::unavailable();
    let orchestrator = creation(
        FakeHosting::new(Behavior::Succeed),
        FakeDispatcher::new(Behavior::Fail),
        registry.clone(),
    );

    let error = orchestrator
        .on_created(&village7())
        .await
        .expect_err("dispatch fails");

    assert!(matches!(error, CreationError::Dispatch(_)));
    assert_eq!(registry.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_dispatch_times_out_and_marks_failed() {
    let registry = MemoryRegistry::seeded([village7()]);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Succeed),
        FakeDispatcher::new(Behavior::Stall),
        registry.clone(),
    )
    .with_call_timeout(Duration::from_secs(2));

    let error = orchestrator
        .on_created(&village7())
        .await
        .expect_err("dispatch times out");

    assert!(error.to_string().contains("timed out"));
    assert_eq!(
        registry.record("village7").map(|r| r.deployment_status),
        Some(DeploymentStatus::Failed)
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_hosting_does_not_block_dispatch() {
    let dispatcher = FakeDispatcher::new(Behavior::Succeed);
    let orchestrator = creation(
        FakeHosting::new(Behavior::Stall),
        dispatcher.clone(),
        MemoryRegistry::seeded([village7()]),
    )
    .with_call_timeout(Duration::from_secs(2));

    let outcome = orchestrator.on_created(&village7()).await.expect("succeeds");

    match outcome.hosting {
        HostingProvision::Failed { error } => assert!(error.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(dispatcher.dispatched().len(), 1);
}
