//! The update orchestrator: startup gating plus the imperative update actions.
//!
//! [`UpdateOrchestrator`] owns the [`StateStore`] and wires every component
//! together:
//!
//! ```text
//! check_for_updates()
//!   -> InstalledVersion::read()
//!   -> ConfigClient::fetch()          (fallback policy on failure)
//!   -> GatingState::apply_policy()    (VersionComparator)
//!   -> BundleUpdateChannel::check()   (unless force-blocked)
//!
//! download_and_install_package()
//!   -> PackageDownloadManager::download()
//!        -> ReleaseArtifactResolver::resolve()
//!   -> PackageInstaller::install()
//! ```
//!
//! No action ever panics or returns an error without first recording it in
//! the owning channel's sub-state. Actions that produce a value also return
//! the error so a CLI can set its exit status.
//!
//! # Examples
//!
//! ```rust,no_run
//! use updatectl::config::UpdaterConfig;
//! use updatectl::upgrade::UpdateOrchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load().await?;
//! let orchestrator = UpdateOrchestrator::from_config(&config)?;
//!
//! let decision = orchestrator.check_for_updates().await;
//! if decision.is_blocking() {
//!     orchestrator.download_and_install_package().await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::UpdaterConfig;
use crate::constants::user_agent;
use crate::core::UpdateError;
use crate::upgrade::bundle::{
    BundleBackend, BundleUpdateChannel, HttpBundleBackend, ProcessReloader, Reloader,
    UnconfiguredBackend,
};
use crate::upgrade::download::PackageDownloadManager;
use crate::upgrade::installer::{
    ActivityManagerLauncher, ContentUriProvider, InstallOutcome, IntentLauncher, PackageInstaller,
};
use crate::upgrade::platform::PackageFormat;
use crate::upgrade::policy::{ConfigClient, VersionPolicy};
use crate::upgrade::resolver::ReleaseArtifactResolver;
use crate::upgrade::state::{DownloadState, GateDecision, GatingState, StateStore, UpdateState};
use crate::utils::fs::cleanup_stale_downloads;
use crate::version::{InstalledVersion, VersionComparator};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the active-download slot when a session ends, however it ends.
struct ActiveSession<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// Builder for [`UpdateOrchestrator`] with injectable platform seams.
pub struct OrchestratorBuilder {
    config: UpdaterConfig,
    client: Option<Client>,
    bundle_backend: Option<Arc<dyn BundleBackend>>,
    reloader: Option<Arc<dyn Reloader>>,
    launcher: Option<Arc<dyn IntentLauncher>>,
}

impl OrchestratorBuilder {
    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the bundle backend derived from `bundle.server_url`.
    #[must_use]
    pub fn bundle_backend(mut self, backend: Arc<dyn BundleBackend>) -> Self {
        self.bundle_backend = Some(backend);
        self
    }

    /// Replace the process re-exec used after a bundle is committed.
    #[must_use]
    pub fn reloader(mut self, reloader: Arc<dyn Reloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Replace the activity-manager intent launcher.
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn IntentLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Assemble the orchestrator.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Config`] when the HTTP client cannot be constructed.
    pub fn build(self) -> Result<UpdateOrchestrator, UpdateError> {
        let config = self.config;
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(user_agent()).build().map_err(|e| {
                UpdateError::Config {
                    message: format!("could not create HTTP client: {e}"),
                }
            })?,
        };

        let installed = InstalledVersion::from_override(config.installed_version.as_deref());
        let format = config.package_platform.package_format().unwrap_or(PackageFormat::APK);
        let download_dir = config.download_dir();

        let config_client = ConfigClient::new(
            client.clone(),
            config.policy_endpoint(),
            config.fallback_download_url.clone(),
            config.config_timeout(),
        );

        let resolver = ReleaseArtifactResolver::new(
            client.clone(),
            format,
            config.metadata_api_host.clone(),
            config.metadata_timeout(),
        );
        let downloader = PackageDownloadManager::new(
            client.clone(),
            resolver,
            config.effective_platform(),
            config.package_platform,
            download_dir.clone(),
        )
        .with_max_resume_attempts(config.max_resume_attempts);

        let launcher = self.launcher.unwrap_or_else(|| {
            Arc::new(ActivityManagerLauncher::new(config.installer.launcher.clone()))
        });
        let installer = PackageInstaller::new(
            ContentUriProvider::new(config.installer.authority.clone(), download_dir),
            format,
            launcher,
        );

        let backend: Arc<dyn BundleBackend> = match (self.bundle_backend, &config.bundle.server_url) {
            (Some(backend), _) => backend,
            (None, Some(url)) => {
                let runtime_version =
                    config.bundle.runtime_version.clone().unwrap_or_else(|| installed.read());
                Arc::new(HttpBundleBackend::new(
                    client,
                    url.clone(),
                    runtime_version,
                    config.bundle_dir(),
                    config.config_timeout(),
                ))
            }
            (None, None) => Arc::new(UnconfiguredBackend),
        };
        let reloader = self.reloader.unwrap_or_else(|| Arc::new(ProcessReloader));
        let bundle = BundleUpdateChannel::new(config.bundle.enabled, backend, reloader);

        Ok(UpdateOrchestrator {
            store: StateStore::new(),
            installed,
            config_client,
            fallback_download_url: config.fallback_download_url,
            downloader,
            installer,
            bundle,
            active_download: Mutex::new(None),
            confirmed_force: Mutex::new(None),
        })
    }
}

/// Top-level update state machine.
#[derive(Debug)]
pub struct UpdateOrchestrator {
    store: StateStore,
    installed: InstalledVersion,
    config_client: ConfigClient,
    fallback_download_url: String,
    downloader: PackageDownloadManager,
    installer: PackageInstaller,
    bundle: BundleUpdateChannel,
    active_download: Mutex<Option<CancellationToken>>,
    /// Last successfully fetched policy that force-blocked this install.
    confirmed_force: Mutex<Option<VersionPolicy>>,
}

impl UpdateOrchestrator {
    pub fn builder(config: UpdaterConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            client: None,
            bundle_backend: None,
            reloader: None,
            launcher: None,
        }
    }

    /// Orchestrator with production seams.
    pub fn from_config(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        Self::builder(config.clone()).build()
    }

    /// Current published state.
    pub fn state(&self) -> UpdateState {
        self.store.snapshot()
    }

    /// Receiver that always holds the latest state.
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.store.subscribe()
    }

    pub fn download_dir(&self) -> &Path {
        self.downloader.download_dir()
    }

    /// Run the startup check and return the gating decision.
    ///
    /// Fully resets the gating fields first, so calling it again (retry)
    /// re-derives everything instead of merging. Never fails: a policy fetch
    /// failure is recorded in `error` and the fallback policy is applied,
    /// unless an earlier fetch in this process confirmed a forced update, in
    /// which case that policy keeps blocking. `is_loading` is `false` before
    /// this returns.
    ///
    /// When not force-blocked, the bundle channel is probed afterwards.
    pub async fn check_for_updates(&self) -> GateDecision {
        let gating = self.store.gating();
        gating.update(GatingState::begin_check);

        let installed = self.installed.read();
        match self.config_client.fetch().await {
            Ok(policy) => {
                let forced = policy.force_update
                    && VersionComparator::is_older(&installed, &policy.min_version);
                *lock(&self.confirmed_force) = forced.then(|| policy.clone());
                gating.update(|g| g.apply_policy(&installed, &policy));
            }
            Err(e) => {
                let confirmed = lock(&self.confirmed_force).clone();
                let policy = match confirmed {
                    Some(policy) => {
                        warn!("{}; keeping the previously confirmed forced update", e);
                        policy
                    }
                    None => {
                        warn!("{}; applying default update policy", e);
                        VersionPolicy::fallback(self.fallback_download_url.clone())
                    }
                };
                gating.update(|g| {
                    g.apply_policy(&installed, &policy);
                    g.record_error(&e);
                });
            }
        }
        gating.update(GatingState::finish_check);

        let decision = gating.get().decision().unwrap_or(GateDecision::UpToDate);
        info!("Update check complete: {:?}", decision);

        if decision.is_blocking() {
            debug!("Force-blocked, skipping bundle probe");
        } else {
            self.bundle.check(&self.store.ota()).await;
        }
        decision
    }

    /// Check the bundle channel; `false` when disabled or nothing is available.
    pub async fn check_for_ota_update(&self) -> bool {
        self.bundle.check(&self.store.ota()).await
    }

    /// Fetch and apply the available bundle; `true` when a restart was started.
    pub async fn apply_ota_update(&self) -> bool {
        self.bundle.apply(&self.store.ota()).await
    }

    /// Download the package named by the current policy.
    ///
    /// Starts a new session: progress goes back to 0 and the previous error is
    /// cleared. Failures keep the last progress value.
    ///
    /// # Errors
    ///
    /// The session's error, also recorded in `download.error`. A second call
    /// while a session is running fails without touching state.
    pub async fn download_package(&self) -> Result<PathBuf, UpdateError> {
        let url = {
            let state = self.store.snapshot();
            let url = state.gating().download_url();
            if url.is_empty() {
                self.fallback_download_url.clone()
            } else {
                url.to_string()
            }
        };

        let cancel = {
            let mut active = lock(&self.active_download);
            if active.is_some() {
                return Err(UpdateError::Download {
                    reason: "another download is already in progress".to_string(),
                });
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };
        let _session = ActiveSession {
            slot: &self.active_download,
        };

        let handle = self.store.download();
        handle.update(DownloadState::begin_session);

        let result = self
            .downloader
            .download(&url, &cancel, |progress| handle.update(|d| d.record_progress(progress)))
            .await;

        match &result {
            Ok(file) => handle.update(|d| d.complete(file.clone())),
            Err(e) => handle.update(|d| d.fail(e)),
        }
        result
    }

    /// Hand a package to the platform installer.
    ///
    /// With `None`, installs the file of the last completed download.
    /// Returning means the installer was launched, not that it succeeded.
    ///
    /// # Errors
    ///
    /// [`UpdateError::PlatformUnsupported`], [`UpdateError::InstallerLaunch`],
    /// or a missing/unsharable file; each also recorded in `download.error`.
    /// While a download is running the call fails without touching state.
    pub async fn install_package(&self, file: Option<&Path>) -> Result<InstallOutcome, UpdateError> {
        if lock(&self.active_download).is_some() {
            return Err(UpdateError::Download {
                reason: "cannot install while a download is in progress".to_string(),
            });
        }

        let handle = self.store.download();
        let result = self.launch_installer(file).await;

        match &result {
            Ok((path, _)) => handle.update(|d| d.mark_launched(path.clone())),
            Err(e) => handle.update(|d| d.fail(e)),
        }
        result.map(|(_, outcome)| outcome)
    }

    async fn launch_installer(
        &self,
        file: Option<&Path>,
    ) -> Result<(PathBuf, InstallOutcome), UpdateError> {
        self.downloader.package_format()?;

        let path = match file {
            Some(path) => path.to_path_buf(),
            None => self
                .store
                .snapshot()
                .download()
                .local_file()
                .map(Path::to_path_buf)
                .ok_or_else(|| UpdateError::Download {
                    reason: "no downloaded package to install".to_string(),
                })?,
        };

        let outcome = self.installer.install(&path).await?;
        Ok((path, outcome))
    }

    /// Download the package, then launch the installer on it.
    pub async fn download_and_install_package(&self) -> Result<InstallOutcome, UpdateError> {
        let file = self.download_package().await?;
        self.install_package(Some(&file)).await
    }

    /// Cancel the running download; `false` when none is running.
    pub fn cancel_download(&self) -> bool {
        match lock(&self.active_download).as_ref() {
            Some(token) => {
                info!("Cancelling package download");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove session files left by earlier downloads.
    ///
    /// The last completed package is kept so it can still be installed.
    /// Nothing is removed while a download is running.
    pub async fn cleanup_stale_downloads(&self) -> anyhow::Result<Vec<PathBuf>> {
        if lock(&self.active_download).is_some() {
            debug!("Download in progress, skipping cleanup");
            return Ok(Vec::new());
        }
        let keep: Vec<PathBuf> =
            self.store.snapshot().download().local_file().map(Path::to_path_buf).into_iter().collect();
        cleanup_stale_downloads(self.download_dir(), &keep).await
    }
}
