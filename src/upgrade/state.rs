//! Published update state and the per-channel mutators that own it.
//!
//! [`UpdateState`] is the only shared mutable value in the update manager. It
//! lives inside a [`tokio::sync::watch`] channel held by [`StateStore`];
//! readers get cheap snapshots or subscribe to changes.
//!
//! Writers never see the whole state. The store hands out one narrow handle
//! per channel:
//!
//! - [`GatingHandle`] mutates only [`GatingState`] (the startup check)
//! - [`OtaHandle`] mutates only [`OtaState`] (the bundle channel)
//! - [`DownloadHandle`] mutates only [`DownloadState`] (the package channel)
//!
//! Each sub-state keeps its fields private and exposes transitions as methods,
//! so the invariants below hold for every reachable state:
//!
//! - `force_update` implies `update_required`
//! - `ota.manifest` is present only while `ota.is_available`
//! - `download.progress` never decreases within a session and returns to 0
//!   only when a new session begins
//!
//! [`UpdatePhase`] is recomputed from the three sub-states after every
//! mutation rather than written by any channel.

use crate::core::UpdateError;
use crate::upgrade::bundle::BundleManifest;
use crate::upgrade::download::DownloadProgress;
use crate::upgrade::policy::VersionPolicy;
use crate::version::VersionComparator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Where the update manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePhase {
    Init,
    Checking,
    UpToDate,
    UpdateAvailable,
    UpdateRequiredSoft,
    UpdateRequiredForced,
    CheckingOta,
    DownloadingPackage,
    Installing,
    Reloading,
}

/// Outcome of the startup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    /// Installed version is current.
    UpToDate,
    /// A newer version exists; nothing is required.
    UpdateAvailable,
    /// Installed version is below the minimum, but the app stays usable.
    UpdateRequiredSoft,
    /// Installed version is below the minimum and the app must be blocked.
    UpdateRequiredForced,
}

impl GateDecision {
    /// Whether the UI must render a blocking surface.
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::UpdateRequiredForced)
    }

    const fn phase(self) -> UpdatePhase {
        match self {
            Self::UpToDate => UpdatePhase::UpToDate,
            Self::UpdateAvailable => UpdatePhase::UpdateAvailable,
            Self::UpdateRequiredSoft => UpdatePhase::UpdateRequiredSoft,
            Self::UpdateRequiredForced => UpdatePhase::UpdateRequiredForced,
        }
    }
}

/// Gating fields derived from the installed version and the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingState {
    is_loading: bool,
    update_required: bool,
    update_available: bool,
    force_update: bool,
    installed_version: String,
    current_version: String,
    download_url: String,
    error: Option<String>,
    decision: Option<GateDecision>,
    #[serde(skip)]
    checking: bool,
}

impl Default for GatingState {
    fn default() -> Self {
        Self {
            is_loading: true,
            update_required: false,
            update_available: false,
            force_update: false,
            installed_version: String::new(),
            current_version: String::new(),
            download_url: String::new(),
            error: None,
            decision: None,
            checking: false,
        }
    }
}

impl GatingState {
    /// Discard everything from the previous check and mark a check in flight.
    pub fn begin_check(&mut self) {
        *self = Self {
            checking: true,
            ..Self::default()
        };
    }

    /// Derive the gating fields from `installed` and `policy`.
    pub fn apply_policy(&mut self, installed: &str, policy: &VersionPolicy) {
        let update_required = VersionComparator::is_older(installed, &policy.min_version);
        let update_available = VersionComparator::is_older(installed, &policy.current_version);
        let force_update = update_required && policy.force_update;

        self.update_required = update_required;
        self.update_available = update_available;
        self.force_update = force_update;
        self.installed_version = installed.to_string();
        self.current_version = policy.current_version.clone();
        self.download_url = policy.download_url.clone();
        self.decision = Some(if force_update {
            GateDecision::UpdateRequiredForced
        } else if update_required {
            GateDecision::UpdateRequiredSoft
        } else if update_available {
            GateDecision::UpdateAvailable
        } else {
            GateDecision::UpToDate
        });
    }

    /// Record a policy-fetch failure for optional display.
    pub fn record_error(&mut self, error: &UpdateError) {
        self.error = Some(error.to_string());
    }

    /// Mark the check complete; the gating fields are now final.
    pub fn finish_check(&mut self) {
        self.checking = false;
        self.is_loading = false;
    }

    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub const fn update_required(&self) -> bool {
        self.update_required
    }

    pub const fn update_available(&self) -> bool {
        self.update_available
    }

    pub const fn force_update(&self) -> bool {
        self.force_update
    }

    pub fn installed_version(&self) -> &str {
        &self.installed_version
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn decision(&self) -> Option<GateDecision> {
        self.decision
    }
}

/// Bundle channel sub-state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtaState {
    is_checking: bool,
    is_available: bool,
    is_downloading: bool,
    is_reloading: bool,
    manifest: Option<BundleManifest>,
    error: Option<String>,
}

impl OtaState {
    /// Start a check, clearing any previously found manifest.
    pub fn begin_check(&mut self) {
        self.is_checking = true;
        self.is_available = false;
        self.manifest = None;
        self.error = None;
    }

    /// Finish a check; `Some` means an update is available.
    pub fn finish_check(&mut self, manifest: Option<BundleManifest>) {
        self.is_checking = false;
        self.is_available = manifest.is_some();
        self.manifest = manifest;
    }

    pub fn fail_check(&mut self, error: &UpdateError) {
        self.is_checking = false;
        self.is_available = false;
        self.manifest = None;
        self.error = Some(error.to_string());
    }

    pub fn begin_apply(&mut self) {
        self.is_downloading = true;
        self.error = None;
    }

    /// The fetch failed or was refused; nothing was reloaded.
    pub fn fail_apply(&mut self, error: &UpdateError) {
        self.is_downloading = false;
        self.is_reloading = false;
        self.error = Some(error.to_string());
    }

    /// The new bundle is on disk and the process is about to restart.
    pub fn mark_reloading(&mut self) {
        self.is_downloading = false;
        self.is_reloading = true;
    }

    pub const fn is_checking(&self) -> bool {
        self.is_checking
    }

    pub const fn is_available(&self) -> bool {
        self.is_available
    }

    pub const fn is_downloading(&self) -> bool {
        self.is_downloading
    }

    pub const fn is_reloading(&self) -> bool {
        self.is_reloading
    }

    pub const fn manifest(&self) -> Option<&BundleManifest> {
        self.manifest.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Kind of the last package-channel failure.
///
/// Lets a UI pick retry or remediation affordances without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageErrorKind {
    Download,
    Cancelled,
    PlatformUnsupported,
    InstallerLaunch,
}

impl PackageErrorKind {
    fn of(error: &UpdateError) -> Self {
        match error {
            UpdateError::DownloadCancelled => Self::Cancelled,
            UpdateError::PlatformUnsupported { .. } => Self::PlatformUnsupported,
            UpdateError::InstallerLaunch { .. } => Self::InstallerLaunch,
            _ => Self::Download,
        }
    }
}

/// Package channel sub-state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadState {
    is_downloading: bool,
    progress: u8,
    bytes_downloaded: u64,
    total_bytes: u64,
    error: Option<String>,
    error_kind: Option<PackageErrorKind>,
    local_file: Option<PathBuf>,
    installer_launched: bool,
}

impl DownloadState {
    /// Start a new session. This is the only place progress goes back to 0.
    pub fn begin_session(&mut self) {
        *self = Self {
            is_downloading: true,
            ..Self::default()
        };
    }

    /// Apply a progress snapshot.
    ///
    /// Byte counts are latest-wins; the percentage never moves backwards.
    pub fn record_progress(&mut self, progress: DownloadProgress) {
        self.bytes_downloaded = progress.bytes_downloaded;
        self.total_bytes = progress.total_bytes;
        self.progress = self.progress.max(progress.percent);
    }

    pub fn complete(&mut self, file: PathBuf) {
        self.is_downloading = false;
        self.progress = 100;
        self.local_file = Some(file);
    }

    /// Record a failure; progress is kept at its last value.
    pub fn fail(&mut self, error: &UpdateError) {
        self.is_downloading = false;
        self.error = Some(error.to_string());
        self.error_kind = Some(PackageErrorKind::of(error));
    }

    /// The installer was handed `file`; tracking ends here.
    pub fn mark_launched(&mut self, file: PathBuf) {
        self.error = None;
        self.error_kind = None;
        self.local_file = Some(file);
        self.installer_launched = true;
    }

    pub const fn is_downloading(&self) -> bool {
        self.is_downloading
    }

    pub const fn progress(&self) -> u8 {
        self.progress
    }

    pub const fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded
    }

    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn error_kind(&self) -> Option<PackageErrorKind> {
        self.error_kind
    }

    pub fn local_file(&self) -> Option<&Path> {
        self.local_file.as_deref()
    }

    pub const fn installer_launched(&self) -> bool {
        self.installer_launched
    }
}

/// The full published state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    phase: UpdatePhase,
    #[serde(flatten)]
    gating: GatingState,
    ota: OtaState,
    download: DownloadState,
}

impl Default for UpdateState {
    fn default() -> Self {
        Self {
            phase: UpdatePhase::Init,
            gating: GatingState::default(),
            ota: OtaState::default(),
            download: DownloadState::default(),
        }
    }
}

impl UpdateState {
    pub const fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub const fn gating(&self) -> &GatingState {
        &self.gating
    }

    pub const fn ota(&self) -> &OtaState {
        &self.ota
    }

    pub const fn download(&self) -> &DownloadState {
        &self.download
    }

    pub const fn is_loading(&self) -> bool {
        self.gating.is_loading
    }

    pub const fn update_required(&self) -> bool {
        self.gating.update_required
    }

    pub const fn update_available(&self) -> bool {
        self.gating.update_available
    }

    pub const fn force_update(&self) -> bool {
        self.gating.force_update
    }

    pub fn error(&self) -> Option<&str> {
        self.gating.error()
    }

    fn refresh_phase(&mut self) {
        self.phase = if self.gating.checking {
            UpdatePhase::Checking
        } else if self.ota.is_reloading {
            UpdatePhase::Reloading
        } else if self.download.installer_launched {
            UpdatePhase::Installing
        } else if self.download.is_downloading {
            UpdatePhase::DownloadingPackage
        } else if self.ota.is_checking || self.ota.is_downloading {
            UpdatePhase::CheckingOta
        } else {
            self.gating.decision.map_or(UpdatePhase::Init, GateDecision::phase)
        };
    }
}

type Sender = Arc<watch::Sender<UpdateState>>;

/// Owner of the published [`UpdateState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Sender,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(UpdateState::default())),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> UpdateState {
        self.tx.borrow().clone()
    }

    /// Receiver that always sees the latest state.
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.tx.subscribe()
    }

    pub(crate) fn gating(&self) -> GatingHandle {
        GatingHandle {
            tx: Arc::clone(&self.tx),
        }
    }

    pub(crate) fn ota(&self) -> OtaHandle {
        OtaHandle {
            tx: Arc::clone(&self.tx),
        }
    }

    pub(crate) fn download(&self) -> DownloadHandle {
        DownloadHandle {
            tx: Arc::clone(&self.tx),
        }
    }
}

macro_rules! channel_handle {
    ($(#[$doc:meta])* $name:ident, $field:ident, $sub:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            tx: Sender,
        }

        impl $name {
            /// Mutate this channel's sub-state and publish the result.
            pub fn update(&self, f: impl FnOnce(&mut $sub)) {
                self.tx.send_modify(|state| {
                    f(&mut state.$field);
                    state.refresh_phase();
                });
            }

            /// Copy of this channel's sub-state.
            pub fn get(&self) -> $sub {
                self.tx.borrow().$field.clone()
            }
        }
    };
}

channel_handle!(
    /// Mutator for the gating fields only.
    GatingHandle,
    gating,
    GatingState
);
channel_handle!(
    /// Mutator for the bundle channel sub-state only.
    OtaHandle,
    ota,
    OtaState
);
channel_handle!(
    /// Mutator for the package channel sub-state only.
    DownloadHandle,
    download,
    DownloadState
);
