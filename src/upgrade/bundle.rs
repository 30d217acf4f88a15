//! Bundle update channel: in-place updates of interpreted application code.
//!
//! A bundle server publishes a manifest describing the newest bundle for a
//! runtime version. When a manifest newer than the running bundle exists, the
//! channel downloads its assets into a staging directory, commits it with a
//! rename, and restarts the process on the new bundle.
//!
//! The channel is independent of the package channel and of gating: its
//! failures only ever land in the `ota` sub-state. In development builds the
//! channel is disabled and every operation is a silent no-op.
//!
//! On-disk layout under the bundle directory:
//!
//! ```text
//! <dir>/current           id of the committed bundle
//! <dir>/<id>/manifest.json
//! <dir>/<id>/launch<ext>
//! <dir>/<id>/assets/<key><ext>
//! ```

use crate::constants::user_agent;
use crate::core::UpdateError;
use crate::upgrade::state::{OtaHandle, OtaState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Environment variable carrying the bundle directory into the restarted process.
pub const BUNDLE_PATH_ENV: &str = "UPDATECTL_BUNDLE_PATH";

/// Header announcing the runtime version to the bundle server.
pub const RUNTIME_VERSION_HEADER: &str = "x-runtime-version";

const CURRENT_MARKER: &str = "current";
const MANIFEST_FILE: &str = "manifest.json";

/// One downloadable file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAsset {
    #[serde(default)]
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub file_extension: Option<String>,
}

/// Manifest of a published bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub id: String,
    pub runtime_version: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub launch_asset: BundleAsset,
    #[serde(default)]
    pub assets: Vec<BundleAsset>,
}

impl BundleManifest {
    #[cfg(test)]
    pub(crate) fn for_tests(id: &str, runtime_version: &str) -> Self {
        Self {
            id: id.to_string(),
            runtime_version: runtime_version.to_string(),
            created_at: None,
            launch_asset: BundleAsset {
                key: "bundle".to_string(),
                url: "https://bundles.test/bundle.js".to_string(),
                content_type: "application/javascript".to_string(),
                file_extension: Some(".js".to_string()),
            },
            assets: Vec::new(),
        }
    }
}

/// Source of bundle manifests and their contents.
#[async_trait]
pub trait BundleBackend: Send + Sync {
    /// Newest applicable bundle, or `None` when the running bundle is current.
    async fn check(&self) -> Result<Option<BundleManifest>, UpdateError>;

    /// Download and store `manifest`, returning the bundle directory.
    ///
    /// Does not make the bundle current. Must leave the current bundle
    /// untouched on failure.
    async fn fetch(&self, manifest: &BundleManifest) -> Result<PathBuf, UpdateError>;

    /// Mark a fetched bundle as current, returning the id it replaced.
    async fn activate(&self, _manifest: &BundleManifest) -> Result<Option<String>, UpdateError> {
        Ok(None)
    }

    /// Put back the current bundle returned by [`BundleBackend::activate`].
    async fn restore(&self, _previous: Option<String>) -> Result<(), UpdateError> {
        Ok(())
    }
}

/// Backend used when no bundle server is configured: never has an update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredBackend;

#[async_trait]
impl BundleBackend for UnconfiguredBackend {
    async fn check(&self) -> Result<Option<BundleManifest>, UpdateError> {
        debug!("No bundle server configured");
        Ok(None)
    }

    async fn fetch(&self, _manifest: &BundleManifest) -> Result<PathBuf, UpdateError> {
        Err(UpdateError::OtaFetch {
            reason: "no bundle server configured".to_string(),
        })
    }
}

/// Bundle server reached over HTTP, with bundles stored under `dir`.
#[derive(Debug, Clone)]
pub struct HttpBundleBackend {
    client: Client,
    manifest_url: String,
    runtime_version: String,
    dir: PathBuf,
    timeout: Duration,
}

impl HttpBundleBackend {
    pub fn new(
        client: Client,
        manifest_url: impl Into<String>,
        runtime_version: impl Into<String>,
        dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            manifest_url: manifest_url.into(),
            runtime_version: runtime_version.into(),
            dir: dir.into(),
            timeout,
        }
    }

    /// Id of the committed bundle, if any.
    pub async fn current_bundle_id(&self) -> Option<String> {
        let id = fs::read_to_string(self.dir.join(CURRENT_MARKER)).await.ok()?;
        let id = id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    async fn download_asset(&self, asset: &BundleAsset, target: &Path) -> Result<(), UpdateError> {
        let fail = |reason: String| UpdateError::OtaFetch {
            reason: format!("asset '{}': {reason}", asset.url),
        };

        let response = self
            .client
            .get(&asset.url)
            .header(reqwest::header::USER_AGENT, user_agent())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| apply_io("create asset directory", &e))?;
        }
        fs::write(target, &bytes).await.map_err(|e| apply_io("write bundle asset", &e))
    }

    async fn commit(&self, staging: &Path, manifest: &BundleManifest) -> Result<PathBuf, UpdateError> {
        let body = serde_json::to_vec_pretty(manifest).map_err(|e| UpdateError::OtaApply {
            reason: format!("could not serialize manifest: {e}"),
        })?;
        fs::write(staging.join(MANIFEST_FILE), body)
            .await
            .map_err(|e| apply_io("write bundle manifest", &e))?;

        let target = self.dir.join(&manifest.id);
        if fs::metadata(&target).await.is_ok() {
            fs::remove_dir_all(&target).await.map_err(|e| apply_io("replace bundle", &e))?;
        }
        fs::rename(staging, &target).await.map_err(|e| apply_io("commit bundle", &e))?;

        Ok(target)
    }

    async fn write_marker(&self, id: &str) -> Result<(), UpdateError> {
        let marker_tmp = self.dir.join(format!("{CURRENT_MARKER}.tmp"));
        fs::write(&marker_tmp, id).await.map_err(|e| apply_io("write bundle marker", &e))?;
        fs::rename(&marker_tmp, self.dir.join(CURRENT_MARKER))
            .await
            .map_err(|e| apply_io("write bundle marker", &e))
    }
}

fn apply_io(operation: &str, err: &std::io::Error) -> UpdateError {
    UpdateError::OtaApply {
        reason: format!("{operation}: {err}"),
    }
}

/// A single path component that cannot escape or hide in its parent.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.')
}

fn check_bundle_id(manifest: &BundleManifest) -> Result<(), UpdateError> {
    if is_plain_name(&manifest.id) {
        Ok(())
    } else {
        Err(UpdateError::OtaFetch {
            reason: format!("invalid bundle id '{}'", manifest.id),
        })
    }
}

/// File name for an asset: its key when that is a plain name, else its index.
fn asset_file_name(asset: &BundleAsset, index: usize) -> String {
    let stem = if is_plain_name(&asset.key) { asset.key.clone() } else { format!("asset-{index}") };
    match &asset.file_extension {
        Some(ext) if !ext.contains(['/', '\\']) => {
            format!("{stem}.{}", ext.trim_start_matches('.'))
        }
        _ => stem,
    }
}

#[async_trait]
impl BundleBackend for HttpBundleBackend {
    async fn check(&self) -> Result<Option<BundleManifest>, UpdateError> {
        debug!("Checking {} for bundle updates", self.manifest_url);
        let fail = |reason: String| UpdateError::OtaFetch { reason };

        let response = self
            .client
            .get(&self.manifest_url)
            .header(reqwest::header::USER_AGENT, user_agent())
            .header(RUNTIME_VERSION_HEADER, &self.runtime_version)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => return Err(fail(format!("HTTP {s}"))),
            _ => {}
        }

        let body = response.text().await.map_err(|e| fail(e.to_string()))?;
        let manifest: BundleManifest =
            serde_json::from_str(&body).map_err(|e| fail(format!("malformed manifest: {e}")))?;
        check_bundle_id(&manifest)?;

        if manifest.runtime_version != self.runtime_version {
            debug!(
                "Ignoring bundle {} for runtime {} (running {})",
                manifest.id, manifest.runtime_version, self.runtime_version
            );
            return Ok(None);
        }
        if self.current_bundle_id().await.as_deref() == Some(manifest.id.as_str()) {
            debug!("Bundle {} is already running", manifest.id);
            return Ok(None);
        }

        info!("Bundle update available: {}", manifest.id);
        Ok(Some(manifest))
    }

    async fn fetch(&self, manifest: &BundleManifest) -> Result<PathBuf, UpdateError> {
        check_bundle_id(manifest)?;
        let staging = self.dir.join(format!(".staging-{}", manifest.id));
        if fs::metadata(&staging).await.is_ok() {
            fs::remove_dir_all(&staging).await.map_err(|e| apply_io("clear staging", &e))?;
        }
        fs::create_dir_all(&staging).await.map_err(|e| apply_io("create staging", &e))?;

        let launch_name = match &manifest.launch_asset.file_extension {
            Some(ext) => format!("launch.{}", ext.trim_start_matches('.')),
            None => "launch".to_string(),
        };

        let mut result = self.download_asset(&manifest.launch_asset, &staging.join(launch_name)).await;
        for (index, asset) in manifest.assets.iter().enumerate() {
            if result.is_err() {
                break;
            }
            let target = staging.join("assets").join(asset_file_name(asset, index));
            result = self.download_asset(asset, &target).await;
        }

        let committed = match result {
            Ok(()) => self.commit(&staging, manifest).await,
            Err(e) => Err(e),
        };
        if committed.is_err() {
            if let Err(e) = fs::remove_dir_all(&staging).await {
                debug!("Could not remove staging {}: {}", staging.display(), e);
            }
        }
        committed
    }

    async fn activate(&self, manifest: &BundleManifest) -> Result<Option<String>, UpdateError> {
        check_bundle_id(manifest)?;
        let previous = self.current_bundle_id().await;
        self.write_marker(&manifest.id).await?;
        Ok(previous)
    }

    async fn restore(&self, previous: Option<String>) -> Result<(), UpdateError> {
        match previous {
            Some(id) => self.write_marker(&id).await,
            None => match fs::remove_file(self.dir.join(CURRENT_MARKER)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(apply_io("clear bundle marker", &e)),
            },
        }
    }
}

/// Restarts the running process on a committed bundle.
pub trait Reloader: Send + Sync {
    /// Restart on `bundle`. Returns only if the restart could not be started.
    fn reload(&self, bundle: &Path) -> Result<(), UpdateError>;
}

/// Re-executes the current binary with [`BUNDLE_PATH_ENV`] pointing at the bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessReloader;

impl Reloader for ProcessReloader {
    fn reload(&self, bundle: &Path) -> Result<(), UpdateError> {
        let exe = std::env::current_exe().map_err(|e| apply_io("locate executable", &e))?;
        let mut command = std::process::Command::new(exe);
        command.args(std::env::args_os().skip(1)).env(BUNDLE_PATH_ENV, bundle);
        info!("Restarting on bundle {}", bundle.display());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            let err = command.exec();
            Err(apply_io("restart process", &err))
        }

        #[cfg(not(unix))]
        {
            command.spawn().map_err(|e| apply_io("restart process", &e))?;
            std::process::exit(0)
        }
    }
}

/// The bundle update channel.
#[derive(Clone)]
pub struct BundleUpdateChannel {
    enabled: bool,
    backend: Arc<dyn BundleBackend>,
    reloader: Arc<dyn Reloader>,
}

impl fmt::Debug for BundleUpdateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleUpdateChannel").field("enabled", &self.enabled).finish_non_exhaustive()
    }
}

impl BundleUpdateChannel {
    pub fn new(enabled: bool, backend: Arc<dyn BundleBackend>, reloader: Arc<dyn Reloader>) -> Self {
        Self {
            enabled,
            backend,
            reloader,
        }
    }

    /// A channel that never does anything.
    pub fn disabled() -> Self {
        Self::new(false, Arc::new(UnconfiguredBackend), Arc::new(ProcessReloader))
    }

    /// Check for a bundle update, recording the result in the `ota` sub-state.
    ///
    /// Returns `false` without touching state when the channel is disabled.
    pub async fn check(&self, ota: &OtaHandle) -> bool {
        if !self.enabled {
            debug!("Bundle channel disabled, skipping check");
            return false;
        }

        ota.update(OtaState::begin_check);
        match self.backend.check().await {
            Ok(manifest) => {
                let available = manifest.is_some();
                ota.update(|s| s.finish_check(manifest));
                available
            }
            Err(e) => {
                warn!("{}", e);
                ota.update(|s| s.fail_check(&e));
                false
            }
        }
    }

    /// Fetch the available bundle and restart on it.
    ///
    /// Checks first when no manifest is known. No restart is attempted unless
    /// the fetch committed the bundle; failures land in `ota.error`. The
    /// bundle is marked current just before the restart and the previous
    /// marker is put back if the restart fails. Returns whether a restart was
    /// started, which in production does not return.
    pub async fn apply(&self, ota: &OtaHandle) -> bool {
        if !self.enabled {
            debug!("Bundle channel disabled, skipping apply");
            return false;
        }

        let manifest = match ota.get().manifest().cloned() {
            Some(manifest) => manifest,
            None => {
                if !self.check(ota).await {
                    return false;
                }
                match ota.get().manifest().cloned() {
                    Some(manifest) => manifest,
                    None => return false,
                }
            }
        };

        ota.update(OtaState::begin_apply);
        let bundle = match self.backend.fetch(&manifest).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("{}", e);
                ota.update(|s| s.fail_apply(&e));
                return false;
            }
        };

        let previous = match self.backend.activate(&manifest).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!("{}", e);
                ota.update(|s| s.fail_apply(&e));
                return false;
            }
        };

        ota.update(OtaState::mark_reloading);
        match self.reloader.reload(&bundle) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                if let Err(restore) = self.backend.restore(previous).await {
                    warn!("Could not restore the previous bundle marker: {}", restore);
                }
                ota.update(|s| s.fail_apply(&e));
                false
            }
        }
    }
}
