//! Startup check behavior against a live policy endpoint.

use crate::common::Backend;
use updatectl::upgrade::{GateDecision, UpdatePhase};

#[tokio::test]
async fn test_outdated_install_is_force_blocked() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    let (orchestrator, _) = backend.orchestrator("1.7.5");

    let decision = orchestrator.check_for_updates().await;

    assert_eq!(decision, GateDecision::UpdateRequiredForced);
    let state = orchestrator.state();
    assert!(state.update_required());
    assert!(state.force_update());
    assert!(state.update_available());
    assert!(!state.is_loading());
    assert_eq!(state.error(), None);
    assert_eq!(state.phase(), UpdatePhase::UpdateRequiredForced);
    assert_eq!(state.gating().download_url(), backend.package_url());
}

#[tokio::test]
async fn test_install_at_minimum_is_not_blocked() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    let (orchestrator, _) = backend.orchestrator("1.8.0");

    let decision = orchestrator.check_for_updates().await;

    assert_eq!(decision, GateDecision::UpdateAvailable);
    let state = orchestrator.state();
    assert!(!state.update_required());
    assert!(!state.force_update());
    assert!(state.update_available());
}

#[tokio::test]
async fn test_soft_requirement_without_force() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", false).await;
    let (orchestrator, _) = backend.orchestrator("1.7.0");

    assert_eq!(orchestrator.check_for_updates().await, GateDecision::UpdateRequiredSoft);
    let state = orchestrator.state();
    assert!(state.update_required());
    assert!(!state.force_update());
    assert_eq!(state.phase(), UpdatePhase::UpdateRequiredSoft);
}

#[tokio::test]
async fn test_current_install_is_up_to_date() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    let (orchestrator, _) = backend.orchestrator("1.9.0");

    assert_eq!(orchestrator.check_for_updates().await, GateDecision::UpToDate);
    let state = orchestrator.state();
    assert!(!state.update_available());
    assert_eq!(state.phase(), UpdatePhase::UpToDate);
}

#[tokio::test]
async fn test_server_error_fails_open() {
    let backend = Backend::start().await;
    backend.mount_policy_status(500).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");

    let decision = orchestrator.check_for_updates().await;

    assert!(!decision.is_blocking());
    let state = orchestrator.state();
    assert!(!state.is_loading());
    assert!(!state.update_required());
    assert!(!state.force_update());
    let error = state.error().expect("error recorded");
    assert!(error.contains("500"), "unexpected error: {error}");
    assert_eq!(
        state.gating().download_url(),
        format!("{}/fallback/app.apk", backend.uri())
    );
}

#[tokio::test]
async fn test_unreachable_backend_fails_open() {
    let backend = Backend::start().await;
    let mut config = backend.config("1.0.0");
    config.backend_url = "http://127.0.0.1:9".to_string();
    let orchestrator = updatectl::upgrade::UpdateOrchestrator::from_config(&config).unwrap();

    orchestrator.check_for_updates().await;

    let state = orchestrator.state();
    assert!(!state.is_loading());
    assert!(!state.update_required());
    assert!(state.error().is_some());
}

#[tokio::test]
async fn test_confirmed_force_survives_later_outage() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    let (orchestrator, _) = backend.orchestrator("1.7.5");
    assert!(orchestrator.check_for_updates().await.is_blocking());

    backend.server.reset().await;
    backend.mount_policy_status(503).await;

    let decision = orchestrator.check_for_updates().await;
    assert_eq!(decision, GateDecision::UpdateRequiredForced);
    let state = orchestrator.state();
    assert!(state.force_update());
    assert!(state.error().is_some());
}

#[tokio::test]
async fn test_retry_rederives_from_scratch() {
    let backend = Backend::start().await;
    backend.mount_policy_status(500).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;
    assert!(orchestrator.state().error().is_some());

    backend.server.reset().await;
    backend.mount_policy("1.0.0", "1.2.0", false).await;

    assert_eq!(orchestrator.check_for_updates().await, GateDecision::UpdateAvailable);
    let state = orchestrator.state();
    assert_eq!(state.error(), None);
    assert_eq!(state.gating().current_version(), "1.2.0");
}

#[tokio::test]
async fn test_subscribers_see_final_state() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", false).await;
    let (orchestrator, _) = backend.orchestrator("1.8.5");
    let mut updates = orchestrator.subscribe();

    orchestrator.check_for_updates().await;

    assert!(updates.has_changed().unwrap());
    let latest = updates.borrow_and_update().clone();
    assert!(!latest.is_loading());
    assert!(latest.update_available());
    assert_eq!(latest, orchestrator.state());
}
