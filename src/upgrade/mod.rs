//! Application self-update manager.
//!
//! This module keeps an installed app current through two independent update
//! channels, gated by a server-side version policy.
//!
//! # Architecture Overview
//!
//! ## Core Components
//!
//! - **[`ConfigClient`]**: Fetches the [`VersionPolicy`] (minimum version, latest
//!   version, force flag, download URL) from the backend
//! - **[`ReleaseArtifactResolver`]**: Turns a release-listing page into a direct
//!   package URL, degrading to the input URL on any failure
//! - **[`PackageDownloadManager`]**: Resumable, cancellable package download with
//!   progress reporting
//! - **[`PackageInstaller`]**: Fire-and-forget hand-off to the platform installer
//! - **[`BundleUpdateChannel`]**: In-place update of interpreted code followed by a
//!   process restart
//! - **[`UpdateOrchestrator`]**: Startup gating plus the imperative actions, owner
//!   of the published [`UpdateState`]
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Startup check
//!    ├── Read installed version (0.0.0 when unreadable)
//!    ├── Fetch version policy (fallback policy on failure)
//!    ├── Derive updateRequired / updateAvailable / forceUpdate
//!    └── Probe the bundle channel unless force-blocked
//!
//! 2. Package update (user-triggered)
//!    ├── Refuse on platforms that cannot install the package
//!    ├── Resolve the release page to an artifact
//!    ├── Stream to a fresh session file, resuming on interruption
//!    └── Launch the platform installer (terminal)
//!
//! 3. Bundle update (opportunistic)
//!    ├── Check the bundle server for a newer manifest
//!    ├── Download and commit the bundle
//!    └── Restart the process on the new bundle
//! ```
//!
//! # Channel Isolation
//!
//! The gating fields, the bundle sub-state and the package sub-state are each
//! written through their own handle (see [`state`]). A failure in one channel
//! is recorded only in that channel's sub-state and never clears or blocks
//! the others.
//!
//! # Usage
//!
//! ```bash
//! updatectl status            # Run the startup check and print the decision
//! updatectl upgrade           # Download the package and launch the installer
//! updatectl ota apply         # Fetch and apply a bundle update
//! ```
//!
//! ```rust,no_run
//! use updatectl::config::UpdaterConfig;
//! use updatectl::upgrade::UpdateOrchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let orchestrator = UpdateOrchestrator::from_config(&UpdaterConfig::default())?;
//! let mut updates = orchestrator.subscribe();
//!
//! orchestrator.check_for_updates().await;
//! let state = updates.borrow_and_update().clone();
//! println!("force update: {}", state.force_update());
//! # Ok(())
//! # }
//! ```

/// Bundle update channel, manifest types and process reload.
pub mod bundle;

/// Resumable package download.
pub mod download;

/// Platform installer hand-off.
pub mod installer;

/// Startup gating and imperative update actions.
pub mod orchestrator;

/// Runtime platforms and package formats.
pub mod platform;

/// Version policy and the client that fetches it.
pub mod policy;

/// Release page to artifact URL resolution.
pub mod resolver;

/// Published update state and per-channel mutators.
pub mod state;


pub use bundle::{BundleManifest, BundleUpdateChannel};
pub use download::{DownloadProgress, PackageDownloadManager};
pub use installer::{InstallOutcome, PackageInstaller};
pub use orchestrator::{OrchestratorBuilder, UpdateOrchestrator};
pub use platform::{PackageFormat, Platform};
pub use policy::{ConfigClient, VersionPolicy};
pub use resolver::{ReleaseArtifactResolver, ResolutionWarning};
pub use state::{GateDecision, UpdatePhase, UpdateState};
