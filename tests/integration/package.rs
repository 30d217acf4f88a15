//! Native package channel: download sessions and installer hand-off.

use std::sync::Arc;
use std::time::Duration;

use crate::common::{Backend, PACKAGE_PATH, package_bytes};
use updatectl::constants::APK_MIME_TYPE;
use updatectl::core::UpdateError;
use updatectl::test_utils::RecordingLauncher;
use updatectl::upgrade::installer::ACTION_VIEW;
use updatectl::upgrade::state::PackageErrorKind;
use updatectl::upgrade::{InstallOutcome, Platform, UpdateOrchestrator, UpdatePhase};

#[tokio::test]
async fn test_download_completes_at_full_progress() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    backend.mount_package(package_bytes(64 * 1024)).await;
    let (orchestrator, _) = backend.orchestrator("1.7.5");
    orchestrator.check_for_updates().await;

    let mut updates = orchestrator.subscribe();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            seen.push((state.download().is_downloading(), state.download().progress()));
            if !state.download().is_downloading() && state.download().local_file().is_some() {
                break;
            }
        }
        seen
    });

    let file = orchestrator.download_package().await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), watcher).await.unwrap().unwrap();

    assert_eq!(std::fs::read(&file).unwrap(), package_bytes(64 * 1024));
    assert!(file.starts_with(backend.dir.path()));

    let state = orchestrator.state();
    assert!(!state.download().is_downloading());
    assert_eq!(state.download().progress(), 100);
    assert_eq!(state.download().local_file(), Some(file.as_path()));
    assert_eq!(state.download().error(), None);

    assert!(seen.iter().any(|(downloading, _)| *downloading));
    let percents: Vec<u8> = seen.iter().map(|(_, p)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {percents:?}");
}

#[tokio::test]
async fn test_release_page_resolves_to_package_asset() {
    let backend = Backend::start().await;
    let release_page = backend.release_page();
    backend.mount_policy_with_url("1.0.0", "1.9.0", false, &release_page).await;
    backend
        .mount_release(&[
            ("checksums.txt", &format!("{}/downloads/checksums.txt", backend.uri())),
            ("app-1.9.0.apk", &backend.package_url()),
        ])
        .await;
    backend.mount_package(package_bytes(4096)).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");

    orchestrator.check_for_updates().await;
    let file = orchestrator.download_package().await.unwrap();

    assert_eq!(std::fs::read(&file).unwrap().len(), 4096);
    assert_eq!(file.extension().and_then(|e| e.to_str()), Some("apk"));
}

#[tokio::test]
async fn test_unmatched_release_downloads_original_url() {
    let backend = Backend::start().await;
    let resolver = updatectl::upgrade::ReleaseArtifactResolver::new(
        reqwest::Client::new(),
        updatectl::upgrade::PackageFormat::APK,
        backend.uri(),
        Duration::from_secs(2),
    );
    backend.mount_release(&[("notes.txt", "https://example.invalid/notes.txt")]).await;

    let page = backend.release_page();
    assert_eq!(resolver.resolve(&page).await, page);
}

#[tokio::test]
async fn test_missing_package_fails_session() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;

    let err = orchestrator.download_package().await.unwrap_err();

    assert!(matches!(err, UpdateError::Download { .. }));
    let state = orchestrator.state();
    assert!(!state.download().is_downloading());
    assert_eq!(state.download().error_kind(), Some(PackageErrorKind::Download));
    assert_eq!(state.download().local_file(), None);
    // The gate is untouched by package failures
    assert_eq!(state.error(), None);
    assert!(state.update_available());
}

#[tokio::test]
async fn test_cancel_stops_download_and_removes_file() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_slow_package(package_bytes(1024), Duration::from_secs(10)).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;

    let (result, cancelled) = tokio::join!(orchestrator.download_package(), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        orchestrator.cancel_download()
    });

    assert!(cancelled);
    assert_eq!(result.unwrap_err(), UpdateError::DownloadCancelled);
    let state = orchestrator.state();
    assert!(!state.download().is_downloading());
    assert_eq!(state.download().error_kind(), Some(PackageErrorKind::Cancelled));
    assert!(!orchestrator.cancel_download());

    let leftovers: Vec<_> = std::fs::read_dir(backend.dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "apk"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_second_download_rejected_while_running() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_slow_package(package_bytes(1024), Duration::from_millis(500)).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;

    let (first, second) = tokio::join!(orchestrator.download_package(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state_before = orchestrator.state();
        let result = orchestrator.download_package().await;
        (result, state_before)
    });

    let (second, state_before) = second;
    assert!(first.is_ok());
    assert!(matches!(second, Err(UpdateError::Download { .. })));
    assert!(state_before.download().is_downloading());
    assert_eq!(orchestrator.state().download().error(), None);
}

#[tokio::test]
async fn test_install_rejected_while_downloading() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_slow_package(package_bytes(1024), Duration::from_millis(500)).await;
    let (orchestrator, launcher) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;

    let (download, (install, during)) = tokio::join!(orchestrator.download_package(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let result = orchestrator.install_package(None).await;
        (result, orchestrator.state())
    });

    assert!(matches!(install, Err(UpdateError::Download { .. })));
    assert!(during.download().is_downloading());
    assert_eq!(during.download().error(), None);
    assert_eq!(during.phase(), UpdatePhase::DownloadingPackage);
    assert!(launcher.intents().is_empty());

    let file = download.unwrap();
    let state = orchestrator.state();
    assert_eq!(state.download().local_file(), Some(file.as_path()));
    assert_eq!(state.download().error(), None);
}

#[tokio::test]
async fn test_download_then_install_launches_installer() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    backend.mount_package(package_bytes(2048)).await;
    let (orchestrator, launcher) = backend.orchestrator("1.7.5");
    orchestrator.check_for_updates().await;

    let InstallOutcome::Launched {
        uri,
    } = orchestrator.download_and_install_package().await.unwrap();

    assert!(uri.as_str().starts_with("content://com.gigmarket.app.fileprovider/updates/"));
    assert!(uri.as_str().ends_with(".apk"));

    let intents = launcher.intents();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].action, ACTION_VIEW);
    assert_eq!(intents[0].mime_type, APK_MIME_TYPE);
    assert_eq!(intents[0].data, uri);

    let state = orchestrator.state();
    assert!(state.download().installer_launched());
    assert_eq!(state.phase(), UpdatePhase::Installing);
}

#[tokio::test]
async fn test_installer_launch_failure_is_recorded() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_package(package_bytes(512)).await;
    let launcher = Arc::new(RecordingLauncher::failing("no activity found to handle intent"));
    let orchestrator = UpdateOrchestrator::builder(backend.config("1.0.0"))
        .launcher(launcher.clone())
        .build()
        .unwrap();
    orchestrator.check_for_updates().await;
    let file = orchestrator.download_package().await.unwrap();

    let err = orchestrator.install_package(None).await.unwrap_err();

    assert!(matches!(err, UpdateError::InstallerLaunch { .. }));
    assert_eq!(launcher.intents().len(), 1);
    let state = orchestrator.state();
    assert_eq!(state.download().error_kind(), Some(PackageErrorKind::InstallerLaunch));
    assert!(!state.download().installer_launched());
    // The downloaded file stays available for another attempt
    assert!(file.exists());
}

#[tokio::test]
async fn test_unsupported_platform_never_touches_network() {
    let backend = Backend::start().await;
    let mut config = backend.config("1.0.0");
    config.platform = Some(Platform::Ios);
    let orchestrator = UpdateOrchestrator::from_config(&config).unwrap();

    let err = orchestrator.download_package().await.unwrap_err();

    assert!(matches!(err, UpdateError::PlatformUnsupported { .. }));
    assert_eq!(
        orchestrator.state().download().error_kind(),
        Some(PackageErrorKind::PlatformUnsupported)
    );
    let requests = backend.server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() != PACKAGE_PATH));
}

#[tokio::test]
async fn test_cleanup_keeps_completed_package() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_package(package_bytes(256)).await;
    let (orchestrator, _) = backend.orchestrator("1.0.0");
    orchestrator.check_for_updates().await;

    let first = orchestrator.download_package().await.unwrap();
    let second = orchestrator.download_package().await.unwrap();
    assert_ne!(first, second);

    let removed = orchestrator.cleanup_stale_downloads().await.unwrap();
    assert_eq!(removed, vec![first.clone()]);
    assert!(!first.exists());
    assert!(second.exists());
}
