//! Test utilities for updatectl
//!
//! Helpers shared by unit tests and the integration suite: logging setup,
//! configuration fixtures pointed at a mock backend, and recording stand-ins
//! for the platform seams (intent launcher and process reloader) so tests
//! never start a real installer or re-exec the test binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use updatectl::test_utils::{RecordingLauncher, test_config};
//! use updatectl::upgrade::UpdateOrchestrator;
//!
//! let launcher = Arc::new(RecordingLauncher::default());
//! let orchestrator = UpdateOrchestrator::builder(test_config(&server.uri(), dir.path(), "1.0.0"))
//!     .launcher(launcher.clone())
//!     .build()?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, PoisonError};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::upgrade::Platform;
use crate::upgrade::bundle::Reloader;
use crate::upgrade::installer::{InstallIntent, IntentLauncher};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`, otherwise leaves logging off.
///
/// ```bash
/// RUST_LOG=updatectl=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Configuration pointed at a mock server.
///
/// Both the policy endpoint and the release-metadata host resolve to
/// `base_url`, the platform is pinned to Android, retries are off and the
/// bundle channel is disabled.
pub fn test_config(base_url: &str, download_dir: &Path, installed_version: &str) -> UpdaterConfig {
    let mut config = UpdaterConfig::default();
    config.backend_url = base_url.to_string();
    config.fallback_download_url = format!("{base_url}/fallback/app.apk");
    config.metadata_api_host = base_url.to_string();
    config.platform = Some(Platform::Android);
    config.installed_version = Some(installed_version.to_string());
    config.download_dir = Some(download_dir.to_path_buf());
    config.config_timeout_secs = 2;
    config.metadata_timeout_secs = 2;
    config.max_resume_attempts = 0;
    config.bundle.enabled = false;
    config.bundle.dir = Some(download_dir.join("bundles"));
    config
}

/// JSON body of a version-policy response.
pub fn policy_body(min: &str, current: &str, force: bool, download_url: &str) -> serde_json::Value {
    serde_json::json!({
        "version": {
            "min_version": min,
            "current_version": current,
            "force_update": force,
            "download_url": download_url,
        }
    })
}

/// JSON body of a release-metadata response with one asset per `(name, url)`.
pub fn release_body(assets: &[(&str, &str)]) -> serde_json::Value {
    let assets: Vec<_> = assets
        .iter()
        .map(|(name, url)| {
            serde_json::json!({
                "name": name,
                "browser_download_url": url,
                "content_type": "application/octet-stream",
            })
        })
        .collect();
    serde_json::json!({ "tag_name": "v1.9.0", "assets": assets })
}

/// Intent launcher that records intents instead of starting anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    intents: Mutex<Vec<InstallIntent>>,
    fail_with: Option<String>,
}

impl RecordingLauncher {
    /// A launcher whose every launch fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            intents: Mutex::default(),
            fail_with: Some(reason.into()),
        }
    }

    /// Intents received so far, including failed ones.
    pub fn intents(&self) -> Vec<InstallIntent> {
        self.intents.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl IntentLauncher for RecordingLauncher {
    fn launch(&self, intent: &InstallIntent) -> Result<(), UpdateError> {
        self.intents.lock().unwrap_or_else(PoisonError::into_inner).push(intent.clone());
        match &self.fail_with {
            Some(reason) => Err(UpdateError::InstallerLaunch {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Reloader that records bundle paths instead of restarting the process.
#[derive(Debug, Default)]
pub struct RecordingReloader {
    reloads: Mutex<Vec<PathBuf>>,
}

impl RecordingReloader {
    pub fn reloads(&self) -> Vec<PathBuf> {
        self.reloads.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Reloader for RecordingReloader {
    fn reload(&self, bundle: &Path) -> Result<(), UpdateError> {
        self.reloads.lock().unwrap_or_else(PoisonError::into_inner).push(bundle.to_path_buf());
        Ok(())
    }
}
