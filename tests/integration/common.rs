//! Mock-backend fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use updatectl::config::UpdaterConfig;
use updatectl::test_utils::{RecordingLauncher, init_test_logging, policy_body, release_body, test_config};
use updatectl::upgrade::UpdateOrchestrator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const POLICY_PATH: &str = "/mobile/config";
pub const PACKAGE_PATH: &str = "/downloads/app-1.9.0.apk";

/// A mock backend plus a private download directory.
pub struct Backend {
    pub server: MockServer,
    pub dir: TempDir,
}

impl Backend {
    pub async fn start() -> Self {
        init_test_logging(None);
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn package_url(&self) -> String {
        format!("{}{PACKAGE_PATH}", self.server.uri())
    }

    pub fn config(&self, installed: &str) -> UpdaterConfig {
        test_config(&self.server.uri(), self.dir.path(), installed)
    }

    /// Orchestrator for `installed` with a recording launcher.
    pub fn orchestrator(&self, installed: &str) -> (UpdateOrchestrator, Arc<RecordingLauncher>) {
        let launcher = Arc::new(RecordingLauncher::default());
        let orchestrator = UpdateOrchestrator::builder(self.config(installed))
            .launcher(launcher.clone())
            .build()
            .expect("build orchestrator");
        (orchestrator, launcher)
    }

    /// Serve a version policy whose download URL is the mock package.
    pub async fn mount_policy(&self, min: &str, current: &str, force: bool) {
        self.mount_policy_with_url(min, current, force, &self.package_url()).await;
    }

    pub async fn mount_policy_with_url(&self, min: &str, current: &str, force: bool, url: &str) {
        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(policy_body(min, current, force, url)))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_policy_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` as the package at [`PACKAGE_PATH`].
    pub async fn mount_package(&self, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(PACKAGE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/vnd.android.package-archive")
                    .set_body_bytes(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve a package that takes `delay` to start responding.
    pub async fn mount_slow_package(&self, body: Vec<u8>, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(PACKAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Serve release metadata for `org/app` latest with the given assets.
    pub async fn mount_release(&self, assets: &[(&str, &str)]) {
        Mock::given(method("GET"))
            .and(path("/repos/org/app/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_body(assets)))
            .mount(&self.server)
            .await;
    }

    /// A release page URL on the mock server.
    pub fn release_page(&self) -> String {
        format!("{}/org/app/releases/latest", self.server.uri())
    }
}

/// Package body of `len` bytes.
pub fn package_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
