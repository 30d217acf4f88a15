//! Over-the-air bundle channel through the orchestrator.

use std::sync::Arc;

use crate::common::Backend;
use serde_json::json;
use updatectl::test_utils::RecordingReloader;
use updatectl::upgrade::bundle::RUNTIME_VERSION_HEADER;
use updatectl::upgrade::{UpdateOrchestrator, UpdatePhase};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

const RUNTIME: &str = "1.9.0";

async fn mount_bundle(backend: &Backend, id: &str) {
    Mock::given(method("GET"))
        .and(path("/bundles/manifest"))
        .and(header(RUNTIME_VERSION_HEADER, RUNTIME))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "runtimeVersion": RUNTIME,
            "createdAt": "2026-09-30T12:00:00Z",
            "launchAsset": {
                "key": "bundle",
                "url": format!("{}/bundles/{id}/bundle.js", backend.uri()),
                "contentType": "application/javascript",
                "fileExtension": ".js",
            },
            "assets": [],
        })))
        .mount(&backend.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/bundles/{id}/bundle.js")))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("// {id}")))
        .mount(&backend.server)
        .await;
}

fn orchestrator(backend: &Backend) -> (UpdateOrchestrator, Arc<RecordingReloader>) {
    let mut config = backend.config(RUNTIME);
    config.bundle.enabled = true;
    config.bundle.server_url = Some(format!("{}/bundles/manifest", backend.uri()));
    let reloader = Arc::new(RecordingReloader::default());
    let orchestrator = UpdateOrchestrator::builder(config)
        .reloader(reloader.clone())
        .build()
        .unwrap();
    (orchestrator, reloader)
}

#[tokio::test]
async fn test_startup_check_probes_bundle_channel() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", RUNTIME, false).await;
    mount_bundle(&backend, "b-7").await;
    let (orchestrator, reloader) = orchestrator(&backend);

    orchestrator.check_for_updates().await;

    let state = orchestrator.state();
    assert!(state.ota().is_available());
    assert_eq!(state.ota().manifest().map(|m| m.id.as_str()), Some("b-7"));
    assert!(reloader.reloads().is_empty());
}

#[tokio::test]
async fn test_forced_gate_skips_bundle_probe() {
    let backend = Backend::start().await;
    backend.mount_policy("2.0.0", "2.0.0", true).await;
    mount_bundle(&backend, "b-7").await;
    let (orchestrator, _) = orchestrator(&backend);

    orchestrator.check_for_updates().await;

    assert!(!orchestrator.state().ota().is_available());
    let requests = backend.server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() != "/bundles/manifest"));
}

#[tokio::test]
async fn test_apply_commits_and_reloads() {
    let backend = Backend::start().await;
    mount_bundle(&backend, "b-8").await;
    let (orchestrator, reloader) = orchestrator(&backend);

    assert!(orchestrator.apply_ota_update().await);

    let committed = backend.dir.path().join("bundles").join("b-8");
    assert_eq!(reloader.reloads(), vec![committed.clone()]);
    assert_eq!(std::fs::read_to_string(committed.join("launch.js")).unwrap(), "// b-8");
    let state = orchestrator.state();
    assert!(state.ota().is_reloading());
    assert_eq!(state.phase(), UpdatePhase::Reloading);

    // The committed bundle is now current
    assert!(!orchestrator.check_for_ota_update().await);
}

#[tokio::test]
async fn test_bundle_server_error_does_not_touch_gate() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.5", false).await;
    Mock::given(method("GET"))
        .and(path("/bundles/manifest"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&backend.server)
        .await;
    let (orchestrator, reloader) = orchestrator(&backend);

    orchestrator.check_for_updates().await;

    let state = orchestrator.state();
    assert!(state.ota().error().is_some());
    assert!(!state.ota().is_available());
    assert_eq!(state.error(), None);
    assert!(state.update_available());
    assert!(!orchestrator.apply_ota_update().await);
    assert!(reloader.reloads().is_empty());
}
