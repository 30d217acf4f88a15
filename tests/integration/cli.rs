//! The `updatectl` binary end to end.

use assert_cmd::Command;
use assert_cmd::assert::{Assert, OutputAssertExt};
use predicates::prelude::*;
use std::path::{Path, PathBuf};

use crate::common::{Backend, package_bytes};
use updatectl::cli::FORCE_BLOCKED_EXIT_CODE;
use updatectl::config::UpdaterConfig;
use updatectl::upgrade::Platform;

fn updatectl() -> Command {
    let mut cmd = Command::cargo_bin("updatectl").unwrap();
    cmd.env("NO_COLOR", "1")
        .env("UPDATECTL_NO_PROGRESS", "1")
        .env_remove("RUST_LOG")
        .env_remove("UPDATECTL_CONFIG_PATH");
    cmd
}

fn write_config(config: &UpdaterConfig, dir: &Path) -> PathBuf {
    let path = dir.join("updatectl.toml");
    std::fs::write(&path, toml::to_string_pretty(config).unwrap()).unwrap();
    path
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(mut cmd: Command) -> Assert {
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap()).await.unwrap();
    output.assert()
}

#[test]
fn test_help_lists_commands() {
    updatectl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("upgrade"))
        .stdout(predicate::str::contains("ota"));
}

#[test]
fn test_config_path_honors_flag() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");

    updatectl()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_show() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("updatectl.toml");

    updatectl().arg("-c").arg(&path).args(["config", "init"]).assert().success();
    assert!(path.exists());

    updatectl()
        .arg("-c")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/mobile/config"));
}

#[test]
fn test_malformed_config_reports_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("updatectl.toml");
    std::fs::write(&path, "backend_url = [").unwrap();

    updatectl()
        .arg("-c")
        .arg(&path)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_exits_nonzero_when_force_blocked() {
    let backend = Backend::start().await;
    backend.mount_policy("1.8.0", "1.9.0", true).await;
    let config = write_config(&backend.config("1.7.5"), backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).args(["status", "--json"]);

    run(cmd)
        .await
        .code(FORCE_BLOCKED_EXIT_CODE)
        .stdout(predicate::str::contains("\"forceUpdate\": true"))
        .stdout(predicate::str::contains("\"phase\": \"UPDATE_REQUIRED_FORCED\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_fails_open_on_server_error() {
    let backend = Backend::start().await;
    backend.mount_policy_status(500).await;
    let config = write_config(&backend.config("1.0.0"), backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).arg("status");

    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Default update rules were applied"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_on_unsupported_platform_fails() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    let mut config = backend.config("1.0.0");
    config.platform = Some(Platform::Ios);
    let config = write_config(&config, backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).arg("download");

    run(cmd).await.code(1).stderr(predicate::str::contains("not supported"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_saves_package() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    backend.mount_package(package_bytes(8192)).await;
    let config = write_config(&backend.config("1.0.0"), backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).arg("download");

    run(cmd).await.success().stdout(predicate::str::contains("Package saved to"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_install_with_missing_launcher_fails() {
    let backend = Backend::start().await;
    let mut config = backend.config("1.0.0");
    config.installer.launcher = "updatectl-test-no-such-launcher".to_string();
    let config = write_config(&config, backend.dir.path());
    let package = backend.dir.path().join("app.apk");
    std::fs::write(&package, package_bytes(128)).unwrap();

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).arg("install").arg(&package);

    run(cmd)
        .await
        .code(1)
        .stderr(predicate::str::contains("Could not launch the package installer"));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_install_launches_configured_launcher() {
    let backend = Backend::start().await;
    let mut config = backend.config("1.0.0");
    config.installer.launcher = "true".to_string();
    let config = write_config(&config, backend.dir.path());
    let outside = tempfile::TempDir::new().unwrap();
    let package = outside.path().join("app.apk");
    std::fs::write(&package, package_bytes(128)).unwrap();

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).arg("install").arg(&package);

    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Installer launched for content://"));
    assert!(backend.dir.path().join("app.apk").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ota_disabled_is_noop() {
    let backend = Backend::start().await;
    let config = write_config(&backend.config("1.0.0"), backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).args(["ota", "check"]);

    run(cmd).await.success().stdout(predicate::str::contains("disabled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_runs_bounded_checks() {
    let backend = Backend::start().await;
    backend.mount_policy("1.0.0", "1.9.0", false).await;
    let config = write_config(&backend.config("1.0.0"), backend.dir.path());

    let mut cmd = updatectl();
    cmd.arg("--config").arg(&config).args(["watch", "--interval", "1", "--count", "2"]);

    run(cmd).await.success().stdout(predicate::str::contains("update available").count(1));
}
